// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Stub bridge for desktop/CI builds where native mobile APIs are unavailable.

use std::sync::Arc;

use cardscan_core::config::CaptureConfig;
use cardscan_core::error::{CardscanError, Result};
use cardscan_core::FrameSink;

use crate::traits::*;

/// No-op bridge returned on platforms without a native camera integration.
pub struct StubBridge;

impl PlatformBridge for StubBridge {
    fn platform_name(&self) -> &str {
        "Desktop (stub)"
    }
}

impl NativeCamera for StubBridge {
    fn start_capture(&self, _config: &CaptureConfig, _sink: Arc<dyn FrameSink>) -> Result<()> {
        tracing::warn!("NativeCamera::start_capture called on stub bridge");
        Err(CardscanError::NoCamera(
            "this device does not support the required input device".into(),
        ))
    }

    fn stop_capture(&self) -> Result<()> {
        Ok(())
    }
}

impl NativePhotoLibrary for StubBridge {
    fn save_image(&self, _png: &[u8]) -> Result<String> {
        tracing::warn!("NativePhotoLibrary::save_image called on stub bridge");
        Err(CardscanError::PlatformUnavailable)
    }
}
