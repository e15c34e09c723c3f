//! Framix is the execution core of a frame-based animation renderer.
//!
//! It turns per-frame scene-node state into rasterized images, caches expensive
//! artifacts (rendered frames, decoded audio seconds) under a process-wide
//! memory budget with spill-to-storage, and mixes independently stretched and
//! shifted audio contributors into per-second sample buffers.
//!
//! # Architecture
//!
//! 1. **Tasks**: units of asynchronous work with a fixed lifecycle
//!    (`Queued -> Processing -> Finished | Canceled`), executed by a
//!    [`Scheduler`] on a CPU worker pool or a serialized GPU stream.
//! 2. **Cache**: [`CacheHandler`]s own disjoint range-keyed containers; a
//!    shared [`CacheManager`] enforces the global budget and spills
//!    least-recently-used payloads to a [`SpillStorage`] backend.
//! 3. **Render**: a [`RenderDataTask`] composes one `(node, frame)` image,
//!    applies raster/GPU effects, and publishes the result back to the node
//!    and into the cache.
//! 4. **Sound**: [`SoundHandler`]s decode sources second-by-second;
//!    [`SoundMergeTask`] resamples, volume-shapes, and sums contributors into
//!    one deterministic output second.
//!
//! The scene-graph node hierarchy, animation curves, and UI are external
//! collaborators; framix consumes them only through the [`SceneNode`] trait.
#![forbid(unsafe_code)]

mod cache;
mod config;
mod foundation;
mod render;
mod scene;
mod sound;
mod task;

pub use cache::container::CachePayload;
pub use cache::handler::{CacheHandler, CachePin};
pub use cache::manager::CacheManager;
pub use cache::storage::{FsSpillStorage, MemSpillStorage, SpillStorage};
pub use config::{EngineConfig, OriginRounding};
pub use foundation::core::{IndexRange, RelFrame, SampleRange, second_sample_range};
pub use foundation::error::{FramixError, FramixResult};
pub use render::customize::RenderCustomizer;
pub use render::data::RenderData;
pub use render::effects::RasterEffect;
pub use render::gpu::{GpuContext, GpuEffect, ProgramId};
pub use render::surface::{BlendMode, Rgba8Premul, Surface};
pub use render::task::{RectAccumulator, RenderDataTask};
pub use scene::node::{NodeRef, SceneNode, SharedNode};
pub use scene::pending::{PendingRenders, RenderStamp};
pub use sound::composition::{PlacedSound, SoundComposition};
pub use sound::envelope::VolumeSnapshot;
pub use sound::handler::{SoundDataHandler, SoundHandler};
pub use sound::merge::{SingleSoundData, SoundMergeTask};
pub use sound::reader::SoundReaderTask;
pub use sound::samples::{Samples, SamplesSlot};
pub use sound::source::{AudioSource, FileAudioSource, MemoryAudioSource};
pub use task::scheduler::Scheduler;
pub use task::task::{Task, TaskHandle, TaskState};

pub use kurbo::{Affine, Point, Rect, Vec2};
