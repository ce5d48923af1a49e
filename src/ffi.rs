//! FFI bindings for Steptally
//!
//! C-compatible functions so a host app can forward its sensor callback into a
//! session and read history back. Strings returned by these functions are heap
//! allocated and must be released with `tally_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::path::PathBuf;
use std::ptr;

use crate::config::{DetectorConfig, DEFAULT_COOLDOWN_MS, DEFAULT_THRESHOLD};
use crate::error::TallyError;
use crate::session::StepSession;
use crate::store::parse_record_date;
use crate::types::AccelerationSample;

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Helper to convert C string to Rust string
unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Helper to convert Rust string to C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

fn json_or_null<T: serde::Serialize>(result: Result<T, TallyError>) -> *mut c_char {
    match result.and_then(|value| Ok(serde_json::to_string(&value)?)) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Opaque handle to a StepSession
pub struct TallySessionHandle {
    session: StepSession,
}

// ============================================================================
// Session Lifecycle
// ============================================================================

/// Open a step session.
///
/// `data_dir` holds `steps.db` and `running.json`; pass NULL for a session that
/// keeps everything in memory. A non-positive `threshold` or negative
/// `cooldown_ms` selects the default.
///
/// # Safety
/// - `data_dir` must be NULL or a valid null-terminated C string.
/// - Must be freed with `tally_session_free`.
/// - Returns NULL on error; call `tally_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn tally_session_open(
    data_dir: *const c_char,
    threshold: f64,
    cooldown_ms: i64,
) -> *mut TallySessionHandle {
    clear_last_error();

    let config = DetectorConfig {
        threshold: if threshold > 0.0 { threshold } else { DEFAULT_THRESHOLD },
        cooldown_ms: if cooldown_ms >= 0 { cooldown_ms } else { DEFAULT_COOLDOWN_MS },
    };

    let result = if data_dir.is_null() {
        StepSession::in_memory(config)
    } else {
        match cstr_to_string(data_dir) {
            Some(dir) => StepSession::open_in(&PathBuf::from(dir), config),
            None => {
                set_last_error("Invalid data_dir string pointer");
                return ptr::null_mut();
            }
        }
    };

    match result {
        Ok(session) => Box::into_raw(Box::new(TallySessionHandle { session })),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Persist the running count and free a session.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `tally_session_open`, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn tally_session_free(handle: *mut TallySessionHandle) {
    if handle.is_null() {
        return;
    }
    // dropping the session persists the running count
    drop(Box::from_raw(handle));
}

// ============================================================================
// Sensor Input
// ============================================================================

/// Feed one accelerometer reading.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `tally_session_open`.
/// - Returns 1 if a step was accepted, 0 if not, -1 on error.
#[no_mangle]
pub unsafe extern "C" fn tally_session_push_sample(
    handle: *mut TallySessionHandle,
    x: f32,
    y: f32,
    z: f32,
    timestamp_ms: i64,
) -> i32 {
    clear_last_error();

    if handle.is_null() {
        set_last_error("Null session pointer");
        return -1;
    }

    let handle = &mut *handle;
    let sample = AccelerationSample::new(x, y, z, timestamp_ms);
    match handle.session.on_sample(&sample) {
        Some(_) => 1,
        None => 0,
    }
}

/// Current running count, or -1 on error.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `tally_session_open`.
#[no_mangle]
pub unsafe extern "C" fn tally_session_running_count(handle: *const TallySessionHandle) -> i64 {
    clear_last_error();

    if handle.is_null() {
        set_last_error("Null session pointer");
        return -1;
    }

    i64::from((*handle).session.running_count())
}

// ============================================================================
// User Actions
// ============================================================================

/// Reset the running count to zero and persist it.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `tally_session_open`.
/// - Returns 0 on success, -1 on error.
#[no_mangle]
pub unsafe extern "C" fn tally_session_reset(handle: *mut TallySessionHandle) -> i32 {
    clear_last_error();

    if handle.is_null() {
        set_last_error("Null session pointer");
        return -1;
    }

    match (*handle).session.reset() {
        Ok(()) => 0,
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

/// Commit the running count as a dated record and reset it.
///
/// `date` is `YYYY-MM-DD`; NULL means today's local date.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `tally_session_open`.
/// - `date` must be NULL or a valid null-terminated C string.
/// - Returns the new record id, or -1 on error.
#[no_mangle]
pub unsafe extern "C" fn tally_session_commit(
    handle: *mut TallySessionHandle,
    date: *const c_char,
) -> i64 {
    clear_last_error();

    if handle.is_null() {
        set_last_error("Null session pointer");
        return -1;
    }

    let handle = &mut *handle;
    let result = if date.is_null() {
        handle.session.commit()
    } else {
        let Some(date_str) = cstr_to_string(date) else {
            set_last_error("Invalid date string pointer");
            return -1;
        };
        match parse_record_date(&date_str) {
            Ok(date) => handle.session.commit_on(date),
            Err(_) => {
                set_last_error(&format!("Invalid date '{}', expected YYYY-MM-DD", date_str));
                return -1;
            }
        }
    };

    match result {
        Ok(id) => id,
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

// ============================================================================
// History
// ============================================================================

/// All committed records as a JSON array.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `tally_session_open`.
/// - Returns a newly allocated string that must be freed with `tally_free_string`.
/// - Returns NULL on error; call `tally_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn tally_session_history_json(
    handle: *const TallySessionHandle,
) -> *mut c_char {
    clear_last_error();

    if handle.is_null() {
        set_last_error("Null session pointer");
        return ptr::null_mut();
    }

    json_or_null((*handle).session.history())
}

/// Committed history as a chart series JSON object.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `tally_session_open`.
/// - Returns a newly allocated string that must be freed with `tally_free_string`.
/// - Returns NULL on error; call `tally_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn tally_session_chart_json(
    handle: *const TallySessionHandle,
) -> *mut c_char {
    clear_last_error();

    if handle.is_null() {
        set_last_error("Null session pointer");
        return ptr::null_mut();
    }

    json_or_null((*handle).session.chart())
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by Steptally functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a Steptally function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn tally_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next Steptally call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn tally_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

/// Get the library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn tally_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    unsafe fn take_string(ptr: *mut c_char) -> String {
        assert!(!ptr.is_null());
        let s = CStr::from_ptr(ptr).to_str().unwrap().to_string();
        tally_free_string(ptr);
        s
    }

    unsafe fn push_peak(handle: *mut TallySessionHandle, timestamp_ms: i64) -> i32 {
        tally_session_push_sample(handle, 0.0, 0.0, 9.0, timestamp_ms);
        tally_session_push_sample(handle, 0.0, 0.0, 15.0, timestamp_ms + 40)
    }

    #[test]
    fn test_ffi_session_lifecycle() {
        unsafe {
            let handle = tally_session_open(ptr::null(), 0.0, -1);
            assert!(!handle.is_null());

            assert_eq!(push_peak(handle, 1_000), 1);
            assert_eq!(push_peak(handle, 1_100), 0);
            assert_eq!(push_peak(handle, 1_600), 1);
            assert_eq!(tally_session_running_count(handle), 2);

            let date = CString::new("2024-02-29").unwrap();
            let id = tally_session_commit(handle, date.as_ptr());
            assert!(id > 0);
            assert_eq!(tally_session_running_count(handle), 0);

            let history: serde_json::Value =
                serde_json::from_str(&take_string(tally_session_history_json(handle))).unwrap();
            assert_eq!(history[0]["step_count"], 2);
            assert_eq!(history[0]["date"], "2024-02-29");

            let chart: serde_json::Value =
                serde_json::from_str(&take_string(tally_session_chart_json(handle))).unwrap();
            assert_eq!(chart["points"][0]["label"], "29/02");
            assert_eq!(chart["label_count"], 1);

            tally_session_free(handle);
        }
    }

    #[test]
    fn test_ffi_running_count_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let dir_c = CString::new(dir.path().to_str().unwrap()).unwrap();

        unsafe {
            let handle = tally_session_open(dir_c.as_ptr(), 12.5, 300);
            assert!(!handle.is_null());
            push_peak(handle, 1_000);
            push_peak(handle, 2_000);
            tally_session_free(handle);

            let handle = tally_session_open(dir_c.as_ptr(), 12.5, 300);
            assert_eq!(tally_session_running_count(handle), 2);
            assert_eq!(tally_session_reset(handle), 0);
            tally_session_free(handle);

            let handle = tally_session_open(dir_c.as_ptr(), 12.5, 300);
            assert_eq!(tally_session_running_count(handle), 0);
            tally_session_free(handle);
        }
    }

    #[test]
    fn test_ffi_error_handling() {
        unsafe {
            let handle = tally_session_open(ptr::null(), 12.5, 300);
            let bad_date = CString::new("29/02/2024").unwrap();

            assert_eq!(tally_session_commit(handle, bad_date.as_ptr()), -1);
            let error = tally_last_error();
            assert!(!error.is_null());
            assert!(!CStr::from_ptr(error).to_str().unwrap().is_empty());

            assert_eq!(tally_session_push_sample(ptr::null_mut(), 0.0, 0.0, 0.0, 0), -1);
            assert_eq!(tally_session_running_count(ptr::null()), -1);

            tally_session_free(handle);
        }
    }

    #[test]
    fn test_ffi_version() {
        unsafe {
            let version = tally_version();
            assert!(!version.is_null());
            assert!(!CStr::from_ptr(version).to_str().unwrap().is_empty());
        }
    }
}
