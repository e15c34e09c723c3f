use std::sync::{Arc, RwLock, Weak};

use kurbo::{Affine, Rect};

use crate::{
    foundation::core::RelFrame,
    render::{data::RenderData, surface::Surface},
};

/// Contract a scene-graph node must satisfy for the render engine.
///
/// The node hierarchy itself (boxes, paths, groups, effects) lives outside
/// this crate; the engine only pulls per-frame renderable state through this
/// trait and pushes finished renders back.
pub trait SceneNode: Send + Sync {
    /// Bounding rectangle in the node's local space at `rel_frame`.
    fn relative_bounding_rect(&self, rel_frame: RelFrame) -> Rect;

    /// Allocate a fresh, empty [`RenderData`] of the node's kind.
    ///
    /// Used by [`RenderData::make_copy`] so copies get the correct concrete
    /// shape without the engine knowing node subtypes.
    fn create_render_data(&self, rel_frame: RelFrame) -> RenderData;

    /// Draw the node's content into `surface` under `transform`.
    fn draw(&self, surface: &mut Surface, transform: Affine);

    /// A finished render for this node arrived; update previews and clear the
    /// pending marker for its frame.
    fn render_finished(&mut self, data: &RenderData);

    /// The render previously pending for `rel_frame` is no longer
    /// authoritative (a newer one took over or processing restarted).
    fn nullify_pending_render(&mut self, rel_frame: RelFrame);
}

/// Shared ownership of a scene node as the engine sees it.
pub type SharedNode = Arc<RwLock<dyn SceneNode>>;

/// Weak back-reference from render state to its owning node.
///
/// Always resolved through an existence check at each access, never
/// dereferenced unconditionally: a destroyed node's in-flight tasks complete
/// normally and just skip the notify step.
#[derive(Clone, Default)]
pub struct NodeRef {
    inner: Option<Weak<RwLock<dyn SceneNode>>>,
}

impl NodeRef {
    /// Weak handle onto `node`.
    pub fn new(node: &SharedNode) -> Self {
        Self {
            inner: Some(Arc::downgrade(node)),
        }
    }

    /// Handle that never resolves; used by detached render snapshots that
    /// outlive their node (export, motion-blur sub-samples).
    pub fn detached() -> Self {
        Self { inner: None }
    }

    /// Resolve to the node if it still exists.
    pub fn upgrade(&self) -> Option<SharedNode> {
        self.inner.as_ref().and_then(Weak::upgrade)
    }

    /// Whether the node currently exists.
    pub fn alive(&self) -> bool {
        self.inner
            .as_ref()
            .is_some_and(|w| w.strong_count() > 0)
    }
}

impl std::fmt::Debug for NodeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeRef").field("alive", &self.alive()).finish()
    }
}
