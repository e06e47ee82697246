// Scene transitions driven by match flow. The dedicated server has no scene
// graph of its own; clients mirror these swaps from the replicated match
// state, so the default loader only records them.

use tracing::info;

pub trait SceneLoader: Send + Sync {
    /// Requests the named scene. `replace_all` tears down everything loaded
    /// before it instead of stacking on top.
    fn load_scene(&self, name: &str, replace_all: bool);
}

pub struct TracingSceneLoader;

impl SceneLoader for TracingSceneLoader {
    fn load_scene(&self, name: &str, replace_all: bool) {
        info!(scene = name, replace_all, "scene transition");
    }
}
