// SPDX-License-Identifier: GPL-3.0-only

//! Backend abstraction layer for camera hardware
//!
//! The backend layer abstracts device access behind a single trait so the
//! session controller never touches a concrete device type:
//!
//! ```text
//! ┌─────────────────────┐
//! │  SessionController  │
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │    DeviceHandle     │  ← exclusive ownership, idempotent release
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │ CaptureDevice trait │  ← common interface
//! └──────────┬──────────┘
//!            │
//!      ┌─────┴─────┐
//!      ▼           ▼
//!  ┌───────┐  ┌─────────┐
//!  │ V4L2  │  │ Virtual │
//!  └───────┘  └─────────┘
//! ```

pub mod camera;
