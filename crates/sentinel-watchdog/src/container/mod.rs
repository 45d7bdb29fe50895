// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Container control backends.

mod docker;
pub mod mock;
mod traits;

pub use docker::DockerCli;
pub use mock::MockContainer;
pub use traits::*;
