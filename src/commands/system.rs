//! System-related Tauri commands

use super::stream::SessionState;
use crate::metrics::SystemInfoView;
use tauri::State;

/// Latest host metrics, or `None` before the first successful poll
#[tauri::command]
pub async fn get_system_info(
    state: State<'_, SessionState>,
) -> Result<Option<SystemInfoView>, String> {
    Ok(state.session.read().await.system_info())
}
