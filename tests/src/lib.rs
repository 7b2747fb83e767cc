//! End-to-end tests over the public `cmover` API.

mod fakes;
mod hosts;
mod migration;
