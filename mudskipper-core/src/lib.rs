// Copyright (C) 2026 Mudskipper Project
//
// MIT License

//! mudskipper-core - ARM debug concepts used by the mudskipper probe.
//!
//! Register-level definitions for the ARM Debug Port, the AHB Access Port,
//! and the Cortex-M core debug block, shared by any transport that speaks to
//! them.  Designed to be used in conjunction with the `mudskipper-swd`
//! library, which drives these registers over Serial Wire Debug.
//!
//! This library is `no_std` and allocation free.

#![no_std]

pub mod arm;
