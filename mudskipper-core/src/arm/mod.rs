// Copyright (C) 2026 Mudskipper Project
//
// MIT License

//! ARM debug register definitions.
//!
//! * [`dp`] - SW-DP Debug Port registers
//! * [`map`] - MEM-AP (AHB-AP) registers
//! * [`debug`] - Cortex-M core debug block (DHCSR/DCRSR/DCRDR)

pub mod debug;
pub mod dp;
pub mod map;
pub mod register;
