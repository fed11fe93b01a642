//! Media Capture Adapter
//! Camera relay sessions: a phone (or any device) posts still frames into
//! a per-draft buffer; `capture` hands the newest frame to the form flow.
//! At most one live session exists per draft, and starting a new one
//! always releases the previous handle first.

use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;
use tracing::info;

use crate::media::ImagePayload;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CaptureError {
    #[error("camera access was denied")]
    PermissionDenied,
    #[error("no camera frame is available")]
    DeviceUnavailable,
    #[error("camera playback failed; restart the capture session")]
    PlaybackFailed,
    #[error("no active capture session")]
    NotActive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Active,
    PermissionDenied,
    PlaybackFailed,
}

#[derive(Debug)]
struct CameraSession {
    state: SessionState,
    latest_frame: Option<ImagePayload>,
}

/// All capture sessions, keyed by draft id.
#[derive(Debug, Default)]
pub struct CameraSessions {
    sessions: Mutex<HashMap<String, CameraSession>>,
}

impl CameraSessions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a session for a draft. Any prior session for the same draft is
    /// released first so no stale device handle lingers. `denied` reports
    /// a client-side permission refusal.
    pub fn start(&self, draft_id: &str, denied: bool) -> Result<(), CaptureError> {
        let mut sessions = self.sessions.lock().unwrap();
        if sessions.remove(draft_id).is_some() {
            info!("Released previous capture session: draft={}", draft_id);
        }
        if denied {
            sessions.insert(
                draft_id.to_string(),
                CameraSession {
                    state: SessionState::PermissionDenied,
                    latest_frame: None,
                },
            );
            return Err(CaptureError::PermissionDenied);
        }
        sessions.insert(
            draft_id.to_string(),
            CameraSession {
                state: SessionState::Active,
                latest_frame: None,
            },
        );
        Ok(())
    }

    /// Buffer the newest still frame for a draft.
    pub fn push_frame(&self, draft_id: &str, frame: ImagePayload) -> Result<(), CaptureError> {
        let mut sessions = self.sessions.lock().unwrap();
        let session = sessions.get_mut(draft_id).ok_or(CaptureError::NotActive)?;
        match session.state {
            SessionState::Active => {
                session.latest_frame = Some(frame);
                Ok(())
            }
            SessionState::PermissionDenied => Err(CaptureError::PermissionDenied),
            SessionState::PlaybackFailed => Err(CaptureError::PlaybackFailed),
        }
    }

    /// Device reported an unrecoverable playback failure after permission
    /// was granted. The session stays addressable so `start` can retry.
    pub fn report_playback_failure(&self, draft_id: &str) -> Result<(), CaptureError> {
        let mut sessions = self.sessions.lock().unwrap();
        let session = sessions.get_mut(draft_id).ok_or(CaptureError::NotActive)?;
        session.state = SessionState::PlaybackFailed;
        session.latest_frame = None;
        Ok(())
    }

    /// Take the buffered frame. Only valid while the session is active;
    /// an active session with no frame yet is `DeviceUnavailable`.
    pub fn capture(&self, draft_id: &str) -> Result<ImagePayload, CaptureError> {
        let mut sessions = self.sessions.lock().unwrap();
        let session = sessions.get_mut(draft_id).ok_or(CaptureError::NotActive)?;
        match session.state {
            SessionState::Active => session
                .latest_frame
                .take()
                .ok_or(CaptureError::DeviceUnavailable),
            SessionState::PermissionDenied => Err(CaptureError::PermissionDenied),
            SessionState::PlaybackFailed => Err(CaptureError::PlaybackFailed),
        }
    }

    /// Release the session. Safe to call when already stopped.
    pub fn stop(&self, draft_id: &str) {
        let mut sessions = self.sessions.lock().unwrap();
        if sessions.remove(draft_id).is_some() {
            info!("Capture session stopped: draft={}", draft_id);
        }
    }

    pub fn is_active(&self, draft_id: &str) -> bool {
        let sessions = self.sessions.lock().unwrap();
        matches!(
            sessions.get(draft_id).map(|s| s.state),
            Some(SessionState::Active)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(tag: u8) -> ImagePayload {
        ImagePayload::new("image/jpeg", vec![tag]).unwrap()
    }

    #[test]
    fn capture_returns_latest_frame_once() {
        let sessions = CameraSessions::new();
        sessions.start("d1", false).unwrap();
        sessions.push_frame("d1", frame(1)).unwrap();
        sessions.push_frame("d1", frame(2)).unwrap();

        let got = sessions.capture("d1").unwrap();
        assert_eq!(got.bytes, vec![2]);
        // Frame is consumed; the next capture waits for a new one.
        assert_eq!(sessions.capture("d1"), Err(CaptureError::DeviceUnavailable));
    }

    #[test]
    fn capture_before_any_frame_is_device_unavailable() {
        let sessions = CameraSessions::new();
        sessions.start("d1", false).unwrap();
        assert_eq!(sessions.capture("d1"), Err(CaptureError::DeviceUnavailable));
    }

    #[test]
    fn capture_without_session_is_not_active() {
        let sessions = CameraSessions::new();
        assert_eq!(sessions.capture("d1"), Err(CaptureError::NotActive));
        assert_eq!(
            sessions.push_frame("d1", frame(1)),
            Err(CaptureError::NotActive)
        );
    }

    #[test]
    fn start_replaces_previous_session() {
        let sessions = CameraSessions::new();
        sessions.start("d1", false).unwrap();
        sessions.push_frame("d1", frame(9)).unwrap();
        // Restart drops the old buffered frame with the old handle.
        sessions.start("d1", false).unwrap();
        assert_eq!(sessions.capture("d1"), Err(CaptureError::DeviceUnavailable));
    }

    #[test]
    fn denied_start_reports_permission_denied() {
        let sessions = CameraSessions::new();
        assert_eq!(sessions.start("d1", true), Err(CaptureError::PermissionDenied));
        assert_eq!(sessions.capture("d1"), Err(CaptureError::PermissionDenied));
        assert!(!sessions.is_active("d1"));
    }

    #[test]
    fn playback_failure_blocks_capture_until_restart() {
        let sessions = CameraSessions::new();
        sessions.start("d1", false).unwrap();
        sessions.push_frame("d1", frame(1)).unwrap();
        sessions.report_playback_failure("d1").unwrap();
        assert_eq!(sessions.capture("d1"), Err(CaptureError::PlaybackFailed));

        // Retry entry point: start again.
        sessions.start("d1", false).unwrap();
        sessions.push_frame("d1", frame(3)).unwrap();
        assert_eq!(sessions.capture("d1").unwrap().bytes, vec![3]);
    }

    #[test]
    fn stop_is_idempotent() {
        let sessions = CameraSessions::new();
        sessions.start("d1", false).unwrap();
        sessions.stop("d1");
        sessions.stop("d1");
        assert!(!sessions.is_active("d1"));
    }
}
