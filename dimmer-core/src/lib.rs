#![no_std]

// Control core for the predictive AC phase-angle dimmer.
//
// This crate stays portable across MCU firmware and host tooling by avoiding
// the Rust standard library. Every hardware capability the core needs (edge
// timestamps, one-shot timers, the gate drive) enters through the traits
// defined here, so the same logic runs under an interrupt-driven firmware
// binding, a simulated mains source, or a plain test harness.

pub mod config;
pub mod controller;
pub mod edge;
pub mod estimator;
pub mod firing;
pub mod pulse;
pub mod telemetry;
