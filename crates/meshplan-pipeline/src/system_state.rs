//! Process-wide, read-only view of `system_params`, set once at startup.
//! Distinct from `config::SystemParamsConfig`: that type is a deserializable
//! record the config layer produces; this is the singleton the rest of the
//! process reads from after it has been validated and logging has started.

use crate::config::SystemParamsConfig;
use once_cell::sync::OnceCell;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct SystemState {
    pub output_dir: PathBuf,
    pub debug_mode: bool,
}

static SYSTEM_STATE: OnceCell<SystemState> = OnceCell::new();

/// Installs the process-wide system state. Must be called exactly once,
/// before any code reads `system_state()`; a second call is a programmer
/// error and panics rather than silently keeping the first value.
pub fn init_system_state(config: &SystemParamsConfig) {
    SYSTEM_STATE
        .set(SystemState { output_dir: config.output_dir.clone(), debug_mode: config.debug_mode })
        .expect("init_system_state called more than once");
}

pub fn system_state() -> &'static SystemState {
    SYSTEM_STATE.get().expect("init_system_state was never called")
}
