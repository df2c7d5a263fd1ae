//! # Rover Teleop Library
//!
//! Drive a four-wheel rover from a USB gamepad, an analog joystick or the
//! keyboard, sending motor frames to the motor controller over serial.
//!
//! The pieces are independent so the web layer and the tests can use them
//! without hardware: [`mode::ModeState`] is the shared enable/aux/wheel
//! state, [`command::DriveCommand`] turns intent into a frame, and
//! [`control::ControlLoop`] ties the devices together at a fixed rate.

pub mod adc;
pub mod command;
pub mod config;
pub mod control;
pub mod controller;
pub mod debounce;
pub mod error;
pub mod fusion;
pub mod mode;
pub mod remote;
pub mod serial;
pub mod viewer;
