// Copyright (c) Bridge Sequencer Contributors
// SPDX-License-Identifier: Apache-2.0

use pin_project::pin_project;
use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

pub trait SleepTrait: Future<Output = ()> + Send {}
impl<T> SleepTrait for T where T: Future<Output = ()> + Send {}

pub trait TimerTrait {}

/// A future that completes after the requested duration. The mock variant
/// resolves immediately since [`super::MockTimeService::sleep`] already
/// advanced the clock synchronously.
#[pin_project(project = SleepProj)]
pub enum Sleep {
    Real(#[pin] tokio::time::Sleep),
    Mock,
}

impl Future for Sleep {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        match self.project() {
            SleepProj::Real(sleep) => sleep.poll(cx),
            SleepProj::Mock => Poll::Ready(()),
        }
    }
}
