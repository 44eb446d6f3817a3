// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// cardscan-bridge — Native platform bridge abstractions.
//
// Defines the camera and photo-library traits the scanner needs from the host
// platform, a stub for builds without native support, and a folder-backed
// bridge that replays image files as camera frames.

pub mod folder;
pub mod stub;
pub mod traits;

pub use folder::FolderBridge;
pub use stub::StubBridge;
pub use traits::{NativeCamera, NativePhotoLibrary, PlatformBridge};

/// The bridge for the target operating system.
///
/// Native camera integrations are supplied by the embedding application;
/// without one every capability reports `PlatformUnavailable`.
pub fn platform_bridge() -> Box<dyn PlatformBridge> {
    Box::new(StubBridge)
}
