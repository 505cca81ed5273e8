//! # Request Dispatcher
//!
//! Maps inbound operation requests (a scan or a named hardware test) onto
//! concrete worker invocations.

use std::path::Path;

use serde::Deserialize;

use crate::config::WorkerConfig;
use crate::error::{Result, ScanRigError};

/// Worker script performing a full scan
pub const SCAN_SCRIPT: &str = "scan.py";

/// Worker script exercising the homing limit switch
pub const LIMIT_SWITCH_SCRIPT: &str = "limit_switch_test.py";

/// Worker script rotating the base through a fixed arc
pub const BASE_MOTOR_SCRIPT: &str = "base_motor_test.py";

/// Worker script exercising the scanning head
pub const HEAD_SCRIPT: &str = "head_test.py";

/// Recovery script returning hardware to a safe resting state
pub const RECOVERY_SCRIPT: &str = "recover.py";

/// Motor speeds accepted for a scan, in Hz
pub const MOTOR_SPEED_RANGE: std::ops::RangeInclusive<u32> = 1..=3;

/// Sample rates accepted for a scan, in Hz
pub const VALID_SAMPLE_RATES: &[u32] = &[500, 750, 1000];

/// Angular ranges accepted for a scan, in degrees of base rotation
pub const VALID_ANGULAR_RANGES: &[u32] = &[15, 45, 90, 180];

/// Parameters for a scan operation
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ScanParams {
    /// Head rotation speed in Hz
    pub motor_speed: u32,

    /// Samples per second
    pub sample_rate: u32,

    /// Base rotation covered by the scan, in degrees
    pub angular_range: u32,

    /// Requested capture name; sanitized before use
    pub file_name: String,
}

impl ScanParams {
    /// Validate parameter ranges
    ///
    /// # Errors
    ///
    /// Returns a request error naming the offending parameter
    pub fn validate(&self) -> Result<()> {
        if !MOTOR_SPEED_RANGE.contains(&self.motor_speed) {
            return Err(ScanRigError::Request(format!(
                "motor_speed {} Hz is outside {}..={} Hz",
                self.motor_speed,
                MOTOR_SPEED_RANGE.start(),
                MOTOR_SPEED_RANGE.end()
            )));
        }

        if !VALID_SAMPLE_RATES.contains(&self.sample_rate) {
            return Err(ScanRigError::Request(format!(
                "sample_rate {} Hz is not one of {:?}",
                self.sample_rate, VALID_SAMPLE_RATES
            )));
        }

        if !VALID_ANGULAR_RANGES.contains(&self.angular_range) {
            return Err(ScanRigError::Request(format!(
                "angular_range {} deg is not one of {:?}",
                self.angular_range, VALID_ANGULAR_RANGES
            )));
        }

        if self.output_stem().is_none() {
            return Err(ScanRigError::Request(format!(
                "file_name {:?} has no usable stem",
                self.file_name
            )));
        }

        Ok(())
    }

    /// Capture file name the worker will write: the request name stripped of
    /// any directory components and prior extension, plus `.csv`
    pub fn output_file_name(&self) -> String {
        match self.output_stem() {
            Some(stem) => format!("{stem}.csv"),
            None => "capture.csv".to_string(),
        }
    }

    fn output_stem(&self) -> Option<&str> {
        Path::new(&self.file_name)
            .file_stem()
            .and_then(|stem| stem.to_str())
            .filter(|stem| !stem.is_empty())
    }
}

/// The fixed set of hardware tests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestKind {
    /// Exercise the homing limit switch
    LimitSwitch,

    /// Rotate the base through a fixed arc
    BaseMotor,

    /// Exercise the scanning head
    Head,

    /// Release the stepper motors
    ReleaseMotors,
}

impl TestKind {
    /// All known tests, in display order
    pub const ALL: [TestKind; 4] = [
        Self::LimitSwitch,
        Self::BaseMotor,
        Self::Head,
        Self::ReleaseMotors,
    ];

    /// Resolve a test from its request name
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "limit_switch" => Some(Self::LimitSwitch),
            "base_motor" => Some(Self::BaseMotor),
            "head" => Some(Self::Head),
            "release_motors" => Some(Self::ReleaseMotors),
            _ => None,
        }
    }

    /// Request name for this test
    pub fn name(self) -> &'static str {
        match self {
            Self::LimitSwitch => "limit_switch",
            Self::BaseMotor => "base_motor",
            Self::Head => "head",
            Self::ReleaseMotors => "release_motors",
        }
    }

    /// Human-readable label for this test
    pub fn label(self) -> &'static str {
        match self {
            Self::LimitSwitch => "Test limit switch",
            Self::BaseMotor => "Rotate base 90 degrees",
            Self::Head => "Test the scanning head",
            Self::ReleaseMotors => "Release stepper motors",
        }
    }
}

/// An inbound operation request
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OperationRequest {
    /// Perform a scan with the given parameters
    Scan(ScanParams),

    /// Run a named hardware test
    Test {
        /// Requested test name; resolved against [`TestKind`]
        name: String,
    },
}

/// A resolved worker command: program plus arguments
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerInvocation {
    pub program: String,
    pub args: Vec<String>,
}

impl WorkerInvocation {
    fn script(config: &WorkerConfig, script: &str, extra: &[String]) -> Self {
        let mut args = vec![config.script_dir.join(script).to_string_lossy().into_owned()];
        args.extend_from_slice(extra);
        Self {
            program: config.interpreter.clone(),
            args,
        }
    }
}

/// Resolve a request to the worker invocation that performs it.
///
/// Returns `Ok(None)` for a test name outside the fixed set; the caller
/// reports that asynchronously as a synthetic `failed` event rather than as a
/// request error, and no process is spawned.
///
/// # Errors
///
/// Returns a request error for out-of-range scan parameters.
pub fn resolve(request: &OperationRequest, config: &WorkerConfig) -> Result<Option<WorkerInvocation>> {
    match request {
        OperationRequest::Scan(params) => {
            params.validate()?;
            let extra = vec![
                format!("--motor-speed={}", params.motor_speed),
                format!("--sample-rate={}", params.sample_rate),
                format!("--angular-range={}", params.angular_range),
                format!("--output={}", params.output_file_name()),
            ];
            Ok(Some(WorkerInvocation::script(config, SCAN_SCRIPT, &extra)))
        }
        OperationRequest::Test { name } => {
            let invocation = TestKind::from_name(name).map(|kind| match kind {
                TestKind::LimitSwitch => WorkerInvocation::script(config, LIMIT_SWITCH_SCRIPT, &[]),
                TestKind::BaseMotor => WorkerInvocation::script(config, BASE_MOTOR_SCRIPT, &[]),
                TestKind::Head => WorkerInvocation::script(config, HEAD_SCRIPT, &[]),
                TestKind::ReleaseMotors => WorkerInvocation::script(
                    config,
                    RECOVERY_SCRIPT,
                    &["--release-motors".to_string()],
                ),
            });
            Ok(invocation)
        }
    }
}

/// The recovery invocation: release actuators and park the head
pub fn recovery_invocation(config: &WorkerConfig) -> WorkerInvocation {
    WorkerInvocation::script(
        config,
        RECOVERY_SCRIPT,
        &["--release-motors".to_string(), "--park-head".to_string()],
    )
}
