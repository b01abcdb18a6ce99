use std::{
	num::{NonZeroI32, NonZeroI64},
	process::ExitStatus,
};

/// The end status of a managed process.
///
/// This is a sort-of equivalent of the [`std::process::ExitStatus`] type which, while
/// constructable, differs on various platforms. The native type is an integer that is interpreted
/// either through convention or via platform-dependent libc or kernel calls; our type is a more
/// structured representation for the purpose of being clearer and transportable.
///
/// On Unix and Windows, the exit status is a 32-bit integer; on Fuchsia it's a 64-bit integer. For
/// portability, we use `i64`. On all platforms, the "success" value is zero, so we special-case
/// that as a variant and use `NonZeroI*` to limit the other values.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "disposition", content = "code"))]
pub enum ProcessEnd {
	/// The process ended successfully, with exit status = 0.
	#[cfg_attr(feature = "serde", serde(rename = "success"))]
	Success,

	/// The process exited with a non-zero exit status.
	#[cfg_attr(feature = "serde", serde(rename = "error"))]
	ExitError(NonZeroI64),

	/// The process was terminated by a signal, given by its raw number.
	#[cfg_attr(feature = "serde", serde(rename = "signal"))]
	ExitSignal(NonZeroI32),

	/// The process was stopped (but not terminated) (`libc::WIFSTOPPED`).
	#[cfg_attr(feature = "serde", serde(rename = "stop"))]
	ExitStop(NonZeroI32),

	/// The process suffered an unhandled exception or warning (typically Windows only).
	#[cfg_attr(feature = "serde", serde(rename = "exception"))]
	Exception(NonZeroI32),

	/// The process was continued (`libc::WIFCONTINUED`).
	#[cfg_attr(feature = "serde", serde(rename = "continued"))]
	Continued,
}

impl ProcessEnd {
	/// A single integer describing this end, for logs and for the wire.
	///
	/// Exit codes are returned as-is. Signal terminations follow the shell convention of
	/// `128 + signal`.
	#[must_use]
	pub fn code(self) -> i64 {
		match self {
			Self::Success | Self::Continued => 0,
			Self::ExitError(code) => code.get(),
			Self::ExitSignal(sig) | Self::ExitStop(sig) => 128 + i64::from(sig.get()),
			Self::Exception(code) => i64::from(code.get()),
		}
	}
}

impl From<ExitStatus> for ProcessEnd {
	#[cfg(unix)]
	fn from(es: ExitStatus) -> Self {
		use std::os::unix::process::ExitStatusExt;

		match (es.code(), es.signal(), es.stopped_signal()) {
			(Some(_), Some(_), _) => {
				unreachable!("exitstatus cannot both be code and signal?!")
			}
			(Some(code), None, _) => {
				NonZeroI64::try_from(i64::from(code)).map_or(Self::Success, Self::ExitError)
			}
			(None, Some(_), Some(stopsig)) => {
				NonZeroI32::try_from(stopsig).map_or(Self::Success, Self::ExitStop)
			}
			#[cfg(not(target_os = "vxworks"))]
			(None, Some(_), _) if es.continued() => Self::Continued,
			(None, Some(signal), _) => {
				NonZeroI32::try_from(signal).map_or(Self::Success, Self::ExitSignal)
			}
			(None, None, _) => Self::Success,
		}
	}

	#[cfg(windows)]
	fn from(es: ExitStatus) -> Self {
		match es.code().map(NonZeroI32::try_from) {
			None | Some(Err(_)) => Self::Success,
			Some(Ok(code)) if code.get() < 0 => Self::Exception(code),
			Some(Ok(code)) => Self::ExitError(code.into()),
		}
	}

	#[cfg(not(any(unix, windows)))]
	fn from(es: ExitStatus) -> Self {
		Self::from_success(es.success())
	}
}

impl ProcessEnd {
	/// For platforms where all that's known is whether the process succeeded.
	#[cfg_attr(any(unix, windows), allow(dead_code))]
	fn from_success(success: bool) -> Self {
		if success {
			Self::Success
		} else {
			NonZeroI64::new(1).map_or(Self::Success, Self::ExitError)
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn codes() {
		assert_eq!(ProcessEnd::Success.code(), 0);
		assert_eq!(
			ProcessEnd::ExitError(NonZeroI64::new(3).unwrap()).code(),
			3
		);
		assert_eq!(
			ProcessEnd::ExitSignal(NonZeroI32::new(9).unwrap()).code(),
			137
		);
	}

	#[test]
	fn bare_failure_is_code_one() {
		assert_eq!(ProcessEnd::from_success(true), ProcessEnd::Success);
		assert_eq!(ProcessEnd::from_success(false).code(), 1);
	}

	#[cfg(unix)]
	#[test]
	fn from_unix_status() {
		use std::os::unix::process::ExitStatusExt;

		// wait(2) encoding: exit code in the second byte, signal in the low bits
		assert_eq!(ProcessEnd::from(ExitStatus::from_raw(0)), ProcessEnd::Success);
		assert_eq!(
			ProcessEnd::from(ExitStatus::from_raw(2 << 8)),
			ProcessEnd::ExitError(NonZeroI64::new(2).unwrap())
		);
		assert_eq!(
			ProcessEnd::from(ExitStatus::from_raw(9)),
			ProcessEnd::ExitSignal(NonZeroI32::new(9).unwrap())
		);
	}
}
