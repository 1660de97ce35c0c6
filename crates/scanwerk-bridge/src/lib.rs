// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scanwerk: platform collaborator abstractions.
//
// The scan workflow never talks to a camera, permission dialog, or file
// picker directly. It drives the traits defined here, and each platform
// supplies an implementation. Desktop and CI builds use `DesktopBridge`.

pub mod desktop;
pub mod traits;

pub use desktop::DesktopBridge;
pub use traits::*;

/// Returns the bridge implementation for the target operating system.
pub fn platform_bridge() -> Box<dyn PlatformBridge> {
    Box::new(DesktopBridge::new())
}
