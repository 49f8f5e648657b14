// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// USB error classification for the reconnect/retry logic.
//
// Classifies a delivery error as recoverable (a disconnect or bus hiccup
// worth a reconnect and retry) or unknown (not retried). Classification is
// pure: no device state is read or written here.

use spoolgate_core::types::UsbErrorKind;

/// OS error codes that indicate disconnection or sleep, worth retrying:
/// EIO, ENXIO, ENODEV, ETIMEDOUT, EREMOTEIO.
const RECOVERABLE_OS_CODES: [i32; 5] = [5, 6, 19, 110, 121];

/// Message fragments that indicate a recoverable USB condition.
const RECOVERABLE_MESSAGES: [&str; 11] = [
    "no backend",
    "device not found",
    "i/o error",
    "input/output error",
    "resource busy",
    "pipe error",
    "could not open",
    "no such device",
    "usb error",
    "endpoint halted",
    "operation timed out",
];

/// Classify whether an error is recoverable via USB reconnection.
///
/// An error is recoverable if it is an I/O error with one of the known OS
/// codes, or its message contains a known fragment, or it wraps a cause that
/// is itself recoverable. Everything else is [`UsbErrorKind::Unknown`] and is
/// treated as non-retryable by callers.
pub fn classify_usb_error(err: &(dyn std::error::Error + 'static)) -> UsbErrorKind {
    if let Some(io_err) = err.downcast_ref::<std::io::Error>() {
        if io_err
            .raw_os_error()
            .is_some_and(|code| RECOVERABLE_OS_CODES.contains(&code))
        {
            return UsbErrorKind::Recoverable;
        }
    }

    let message = err.to_string().to_ascii_lowercase();
    if RECOVERABLE_MESSAGES
        .iter()
        .any(|fragment| message.contains(fragment))
    {
        return UsbErrorKind::Recoverable;
    }

    // Some backends wrap the underlying USB error; walk the cause chain.
    if let Some(source) = err.source() {
        if classify_usb_error(source) == UsbErrorKind::Recoverable {
            return UsbErrorKind::Recoverable;
        }
    }

    UsbErrorKind::Unknown
}

/// Convenience check used by the retry loop.
pub fn is_recoverable(err: &(dyn std::error::Error + 'static)) -> bool {
    classify_usb_error(err) == UsbErrorKind::Recoverable
}

#[cfg(test)]
mod tests {
    use super::*;
    use spoolgate_core::error::SpoolgateError;

    fn os_error(code: i32) -> SpoolgateError {
        SpoolgateError::Io(std::io::Error::from_raw_os_error(code))
    }

    #[test]
    fn recoverable_os_codes() {
        for code in [5, 6, 19, 110, 121] {
            let err = os_error(code);
            assert_eq!(
                classify_usb_error(&err),
                UsbErrorKind::Recoverable,
                "code {code} should be recoverable"
            );
            assert!(is_recoverable(&err));
        }
    }

    #[test]
    fn unrelated_os_code_is_unknown() {
        // EACCES: permission problems are not fixed by replugging.
        let err = os_error(13);
        assert_eq!(classify_usb_error(&err), UsbErrorKind::Unknown);
    }

    #[test]
    fn device_not_found_message_is_recoverable() {
        let err = SpoolgateError::Usb("USB device not found".into());
        assert_eq!(classify_usb_error(&err), UsbErrorKind::Recoverable);
    }

    #[test]
    fn io_error_message_is_recoverable() {
        let err = SpoolgateError::Usb("backend reported I/O error on endpoint 2".into());
        assert_eq!(classify_usb_error(&err), UsbErrorKind::Recoverable);
    }

    #[test]
    fn generic_error_is_unknown() {
        let err = SpoolgateError::InvalidJob("bad input".into());
        assert_eq!(classify_usb_error(&err), UsbErrorKind::Unknown);
        assert!(!is_recoverable(&err));
    }

    #[test]
    fn wrapped_recoverable_cause_is_recoverable() {
        let err = SpoolgateError::transport(
            "send failed",
            std::io::Error::from_raw_os_error(5),
        );
        assert_eq!(classify_usb_error(&err), UsbErrorKind::Recoverable);
    }

    #[test]
    fn wrapped_unrelated_cause_is_unknown() {
        let err = SpoolgateError::transport(
            "send failed",
            std::io::Error::new(std::io::ErrorKind::InvalidData, "garbled frame"),
        );
        assert_eq!(classify_usb_error(&err), UsbErrorKind::Unknown);
    }
}
