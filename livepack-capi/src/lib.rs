//! Livepack C API
//!
//! C-compatible surface over the livepack packager for host applications.
//! Handles are opaque; segment bytes cross the boundary as pointer/length
//! pairs and land in caller-owned output buffers.
//!
//! # Safety
//!
//! All functions are designed to be called from C. Null pointers are
//! rejected with an error status instead of being dereferenced; freeing a
//! null handle is a no-op. Error messages travel as heap-allocated C
//! strings the caller releases with [`livepack_status_free`].
//!
//! # Example Usage (C)
//!
//! ```c
//! LivepackConfig cfg = {
//!     .format = LIVEPACK_FORMAT_FMP4,
//!     .track_type = LIVEPACK_TRACK_VIDEO,
//!     .protection_scheme = LIVEPACK_SCHEME_NONE,
//!     .segment_number = 1,
//! };
//! LivepackPackager* packager = livepack_new(&cfg);
//! LivepackBuffer* out = livepack_buffer_new();
//!
//! LivepackStatus st = livepack_package(packager, init, init_len, seg, seg_len, out);
//! if (st.ok) {
//!     fwrite(livepack_buffer_data(out), 1, livepack_buffer_size(out), f);
//! }
//! livepack_status_free(&st);
//! livepack_buffer_free(out);
//! livepack_free(packager);
//! ```

use livepack::{
    FullSegmentBuffer, LiveConfig, LivePackager, OutputFormat, ProtectionScheme, TrackType,
};
use livepack_core::{logging, Severity};
use std::ffi::{c_char, CString};
use std::ptr;
use std::slice;

/// Output container formats.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LivepackFormat {
    /// Fragmented MP4 (CMAF).
    Fmp4 = 0,
    /// MPEG-2 transport stream.
    Ts = 1,
    /// WebVTT in MP4.
    VttMp4 = 2,
    /// TTML in MP4.
    TtmlMp4 = 3,
    /// Raw TTML pass-through.
    Ttml = 4,
}

/// Track types.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LivepackTrackType {
    /// Audio track.
    Audio = 0,
    /// Video track.
    Video = 1,
    /// Timed-text track.
    Text = 2,
}

/// Content protection schemes.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LivepackScheme {
    /// No encryption.
    None = 0,
    /// HLS SAMPLE-AES.
    SampleAes = 1,
    /// Whole-segment AES-128-CBC.
    Aes128 = 2,
    /// Common encryption, cbcs flavour.
    Cbcs = 3,
    /// Common encryption, cenc flavour.
    Cenc = 4,
}

/// Key and IV field width in the config struct.
pub const LIVEPACK_KEY_IV_LEN: usize = 16;

/// Packager configuration mirrored from the Rust `LiveConfig`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct LivepackConfig {
    /// Output container format.
    pub format: LivepackFormat,
    /// Track type.
    pub track_type: LivepackTrackType,
    /// Protection scheme.
    pub protection_scheme: LivepackScheme,
    /// Initialization vector bytes.
    pub iv: [u8; LIVEPACK_KEY_IV_LEN],
    /// Number of meaningful IV bytes (8 or 16).
    pub iv_size: u32,
    /// AES-128 content key.
    pub key: [u8; LIVEPACK_KEY_IV_LEN],
    /// Key identifier.
    pub key_id: [u8; LIVEPACK_KEY_IV_LEN],
    /// Bitset of protection systems to embed as PSSH boxes.
    pub protection_systems: u32,
    /// Segment number.
    pub segment_number: u32,
    /// Milliseconds added to TS timestamps.
    pub m2ts_offset_ms: i32,
    /// Base decode time for timed-text output.
    pub timed_text_decode_time: i64,
}

/// Result of a packaging call.
///
/// When `ok` is false, `error_message` points at a heap-allocated C string
/// owned by the callee; release it with [`livepack_status_free`].
#[repr(C)]
pub struct LivepackStatus {
    /// Whether the call succeeded.
    pub ok: bool,
    /// Error description, null on success.
    pub error_message: *mut c_char,
}

impl LivepackStatus {
    fn success() -> Self {
        Self {
            ok: true,
            error_message: ptr::null_mut(),
        }
    }

    fn failure(message: impl Into<Vec<u8>>) -> Self {
        let cstring = CString::new(message).unwrap_or_default();
        Self {
            ok: false,
            error_message: cstring.into_raw(),
        }
    }
}

/// Opaque packager handle.
pub struct LivepackPackager {
    inner: LivePackager,
}

/// Opaque output buffer handle.
#[derive(Default)]
pub struct LivepackBuffer {
    inner: FullSegmentBuffer,
}

/// Log severities accepted by the sink installer.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LivepackSeverity {
    /// Informational and above.
    Info = 0,
    /// Warnings and above.
    Warning = 1,
    /// Errors and above.
    Error = 2,
    /// Fatal only.
    Fatal = 3,
}

fn convert_config(config: &LivepackConfig) -> LiveConfig {
    let format = match config.format {
        LivepackFormat::Fmp4 => OutputFormat::Fmp4,
        LivepackFormat::Ts => OutputFormat::Ts,
        LivepackFormat::VttMp4 => OutputFormat::VttMp4,
        LivepackFormat::TtmlMp4 => OutputFormat::TtmlMp4,
        LivepackFormat::Ttml => OutputFormat::Ttml,
    };
    let track_type = match config.track_type {
        LivepackTrackType::Audio => TrackType::Audio,
        LivepackTrackType::Video => TrackType::Video,
        LivepackTrackType::Text => TrackType::Text,
    };
    let protection_scheme = match config.protection_scheme {
        LivepackScheme::None => ProtectionScheme::None,
        LivepackScheme::SampleAes => ProtectionScheme::SampleAes,
        LivepackScheme::Aes128 => ProtectionScheme::Aes128,
        LivepackScheme::Cbcs => ProtectionScheme::Cbcs,
        LivepackScheme::Cenc => ProtectionScheme::Cenc,
    };

    let keyed = protection_scheme != ProtectionScheme::None;
    let iv_len = if config.iv_size == 8 { 8 } else { LIVEPACK_KEY_IV_LEN };

    LiveConfig {
        format,
        track_type,
        protection_scheme,
        iv: if keyed { config.iv[..iv_len].to_vec() } else { Vec::new() },
        key: if keyed { config.key.to_vec() } else { Vec::new() },
        key_id: if keyed { config.key_id.to_vec() } else { Vec::new() },
        protection_systems: config.protection_systems,
        segment_number: config.segment_number,
        m2ts_offset_ms: config.m2ts_offset_ms,
        timed_text_decode_time: config.timed_text_decode_time,
        decryption_key: None,
    }
}

/// Create a packager for the given configuration.
///
/// Returns null when the configuration is invalid; use
/// [`livepack_new_with_status`] to receive the rejection message.
///
/// # Safety
///
/// `config` must point at a valid `LivepackConfig`.
#[no_mangle]
pub unsafe extern "C" fn livepack_new(config: *const LivepackConfig) -> *mut LivepackPackager {
    let mut status = LivepackStatus::success();
    let packager = livepack_new_with_status(config, &mut status);
    livepack_status_free(&mut status);
    packager
}

/// Create a packager, reporting rejection reasons through `status`.
///
/// # Safety
///
/// `config` must point at a valid `LivepackConfig`; `status` must point at
/// writable memory for one `LivepackStatus`.
#[no_mangle]
pub unsafe extern "C" fn livepack_new_with_status(
    config: *const LivepackConfig,
    status: *mut LivepackStatus,
) -> *mut LivepackPackager {
    if status.is_null() {
        return ptr::null_mut();
    }
    if config.is_null() {
        *status = LivepackStatus::failure("config cannot be null");
        return ptr::null_mut();
    }

    match LivePackager::new(convert_config(&*config)) {
        Ok(inner) => {
            *status = LivepackStatus::success();
            Box::into_raw(Box::new(LivepackPackager { inner }))
        }
        Err(err) => {
            *status = LivepackStatus::failure(err.to_string());
            ptr::null_mut()
        }
    }
}

/// Destroy a packager. Null handles are ignored.
///
/// # Safety
///
/// `packager` must be null or a pointer returned by `livepack_new`.
#[no_mangle]
pub unsafe extern "C" fn livepack_free(packager: *mut LivepackPackager) {
    if !packager.is_null() {
        drop(Box::from_raw(packager));
    }
}

/// Allocate an output buffer.
#[no_mangle]
pub extern "C" fn livepack_buffer_new() -> *mut LivepackBuffer {
    Box::into_raw(Box::default())
}

/// Destroy an output buffer. Null handles are ignored.
///
/// # Safety
///
/// `buffer` must be null or a pointer returned by `livepack_buffer_new`.
#[no_mangle]
pub unsafe extern "C" fn livepack_buffer_free(buffer: *mut LivepackBuffer) {
    if !buffer.is_null() {
        drop(Box::from_raw(buffer));
    }
}

/// Pointer to the buffer's full contents (init segment + body).
///
/// # Safety
///
/// `buffer` must be a valid buffer handle. The pointer is invalidated by
/// the next packaging call using the buffer.
#[no_mangle]
pub unsafe extern "C" fn livepack_buffer_data(buffer: *const LivepackBuffer) -> *const u8 {
    if buffer.is_null() {
        return ptr::null();
    }
    (*buffer).inner.data().as_ptr()
}

/// Total size of the buffer contents.
///
/// # Safety
///
/// `buffer` must be null or a valid buffer handle.
#[no_mangle]
pub unsafe extern "C" fn livepack_buffer_size(buffer: *const LivepackBuffer) -> usize {
    if buffer.is_null() {
        return 0;
    }
    (*buffer).inner.size()
}

/// Pointer to the init segment region of the buffer.
///
/// # Safety
///
/// `buffer` must be a valid buffer handle.
#[no_mangle]
pub unsafe extern "C" fn livepack_buffer_init_data(buffer: *const LivepackBuffer) -> *const u8 {
    if buffer.is_null() {
        return ptr::null();
    }
    (*buffer).inner.init_segment_data().as_ptr()
}

/// Size of the init segment region.
///
/// # Safety
///
/// `buffer` must be null or a valid buffer handle.
#[no_mangle]
pub unsafe extern "C" fn livepack_buffer_init_size(buffer: *const LivepackBuffer) -> usize {
    if buffer.is_null() {
        return 0;
    }
    (*buffer).inner.init_segment_size()
}

/// Pointer to the media body region of the buffer.
///
/// # Safety
///
/// `buffer` must be a valid buffer handle.
#[no_mangle]
pub unsafe extern "C" fn livepack_buffer_segment_data(buffer: *const LivepackBuffer) -> *const u8 {
    if buffer.is_null() {
        return ptr::null();
    }
    (*buffer).inner.segment_data().as_ptr()
}

/// Size of the media body region.
///
/// # Safety
///
/// `buffer` must be null or a valid buffer handle.
#[no_mangle]
pub unsafe extern "C" fn livepack_buffer_segment_size(buffer: *const LivepackBuffer) -> usize {
    if buffer.is_null() {
        return 0;
    }
    (*buffer).inner.segment_size()
}

unsafe fn borrow_input<'a>(data: *const u8, len: usize) -> Option<&'a [u8]> {
    if data.is_null() && len > 0 {
        return None;
    }
    if len == 0 {
        return Some(&[]);
    }
    Some(slice::from_raw_parts(data, len))
}

/// Package only an init segment.
///
/// # Safety
///
/// `packager` and `dest` must be valid handles; `init` must point at
/// `init_len` readable bytes.
#[no_mangle]
pub unsafe extern "C" fn livepack_package_init(
    packager: *mut LivepackPackager,
    init: *const u8,
    init_len: usize,
    dest: *mut LivepackBuffer,
) -> LivepackStatus {
    if packager.is_null() {
        return LivepackStatus::failure("packager cannot be null");
    }
    if dest.is_null() {
        return LivepackStatus::failure("output data cannot be null");
    }
    let Some(init) = borrow_input(init, init_len) else {
        return LivepackStatus::failure("init segment cannot be null");
    };

    let dest = &mut (*dest).inner;
    dest.clear();
    match (*packager).inner.package_init(init, dest) {
        Ok(()) => LivepackStatus::success(),
        Err(err) => {
            dest.clear();
            LivepackStatus::failure(err.to_string())
        }
    }
}

/// Package one media segment given its init segment.
///
/// # Safety
///
/// `packager` and `dest` must be valid handles; `init` and `seg` must point
/// at `init_len` and `seg_len` readable bytes.
#[no_mangle]
pub unsafe extern "C" fn livepack_package(
    packager: *mut LivepackPackager,
    init: *const u8,
    init_len: usize,
    seg: *const u8,
    seg_len: usize,
    dest: *mut LivepackBuffer,
) -> LivepackStatus {
    if packager.is_null() {
        return LivepackStatus::failure("packager cannot be null");
    }
    if dest.is_null() {
        return LivepackStatus::failure("output data cannot be null");
    }
    let (Some(init), Some(seg)) = (borrow_input(init, init_len), borrow_input(seg, seg_len))
    else {
        return LivepackStatus::failure("segment data cannot be null");
    };

    let dest = &mut (*dest).inner;
    dest.clear();
    match (*packager).inner.package(init, seg, dest) {
        Ok(()) => LivepackStatus::success(),
        Err(err) => {
            dest.clear();
            LivepackStatus::failure(err.to_string())
        }
    }
}

/// Package a timed-text segment.
///
/// # Safety
///
/// `packager` and `dest` must be valid handles; `seg` must point at
/// `seg_len` readable bytes.
#[no_mangle]
pub unsafe extern "C" fn livepack_package_timedtext(
    packager: *mut LivepackPackager,
    seg: *const u8,
    seg_len: usize,
    dest: *mut LivepackBuffer,
) -> LivepackStatus {
    if packager.is_null() {
        return LivepackStatus::failure("packager cannot be null");
    }
    if dest.is_null() {
        return LivepackStatus::failure("output data cannot be null");
    }
    let Some(seg) = borrow_input(seg, seg_len) else {
        return LivepackStatus::failure("segment data cannot be null");
    };

    let dest = &mut (*dest).inner;
    dest.clear();
    match (*packager).inner.package_timed_text(seg, dest) {
        Ok(()) => LivepackStatus::success(),
        Err(err) => {
            dest.clear();
            LivepackStatus::failure(err.to_string())
        }
    }
}

/// Release the error message carried by a status, if any.
///
/// # Safety
///
/// `status` must be null or a status returned by this library, freed at
/// most once.
#[no_mangle]
pub unsafe extern "C" fn livepack_status_free(status: *mut LivepackStatus) {
    if status.is_null() {
        return;
    }
    let status = &mut *status;
    if !status.error_message.is_null() {
        drop(CString::from_raw(status.error_message));
        status.error_message = ptr::null_mut();
    }
}

/// Install the process-wide buffered log sink.
#[no_mangle]
pub extern "C" fn livepack_log_sink_install(severity: LivepackSeverity) {
    let severity = match severity {
        LivepackSeverity::Info => Severity::Info,
        LivepackSeverity::Warning => Severity::Warning,
        LivepackSeverity::Error => Severity::Error,
        LivepackSeverity::Fatal => Severity::Fatal,
    };
    logging::install(severity);
}

/// Remove the buffered log sink.
#[no_mangle]
pub extern "C" fn livepack_log_sink_remove() {
    logging::remove();
}

/// Drain buffered log records as one newline-separated C string, or null
/// when the sink is empty. Free with [`livepack_string_free`].
#[no_mangle]
pub extern "C" fn livepack_log_sink_drain() -> *mut c_char {
    let records = logging::drain();
    if records.is_empty() {
        return ptr::null_mut();
    }

    let joined = records
        .iter()
        .map(|r| format!("{:?}: {}", r.severity, r.message))
        .collect::<Vec<_>>()
        .join("\n");
    CString::new(joined).unwrap_or_default().into_raw()
}

/// Release a string returned by this library.
///
/// # Safety
///
/// `string` must be null or a pointer returned by this library, freed at
/// most once.
#[no_mangle]
pub unsafe extern "C" fn livepack_string_free(string: *mut c_char) {
    if !string.is_null() {
        drop(CString::from_raw(string));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clear_config() -> LivepackConfig {
        LivepackConfig {
            format: LivepackFormat::Fmp4,
            track_type: LivepackTrackType::Video,
            protection_scheme: LivepackScheme::None,
            iv: [0; 16],
            iv_size: 16,
            key: [0; 16],
            key_id: [0; 16],
            protection_systems: 0,
            segment_number: 1,
            m2ts_offset_ms: 0,
            timed_text_decode_time: 0,
        }
    }

    #[test]
    fn test_new_and_free() {
        let config = clear_config();
        let packager = unsafe { livepack_new(&config) };
        assert!(!packager.is_null());
        unsafe { livepack_free(packager) };
    }

    #[test]
    fn test_invalid_config_reports_status() {
        let mut config = clear_config();
        config.protection_scheme = LivepackScheme::Aes128; // invalid with FMP4

        let mut status = LivepackStatus::success();
        let packager = unsafe { livepack_new_with_status(&config, &mut status) };
        assert!(packager.is_null());
        assert!(!status.ok);
        assert!(!status.error_message.is_null());

        unsafe { livepack_status_free(&mut status) };
        assert!(status.error_message.is_null());
    }

    #[test]
    fn test_null_dest_rejected() {
        let config = clear_config();
        let packager = unsafe { livepack_new(&config) };

        let mut status =
            unsafe { livepack_package_init(packager, ptr::null(), 0, ptr::null_mut()) };
        assert!(!status.ok);
        let message = unsafe { std::ffi::CStr::from_ptr(status.error_message) };
        assert_eq!(message.to_str().unwrap(), "output data cannot be null");

        unsafe { livepack_status_free(&mut status) };
        unsafe { livepack_free(packager) };
    }

    #[test]
    fn test_buffer_lifecycle() {
        let buffer = livepack_buffer_new();
        unsafe {
            assert_eq!(livepack_buffer_size(buffer), 0);
            assert_eq!(livepack_buffer_init_size(buffer), 0);
            livepack_buffer_free(buffer);
        }
    }

    #[test]
    fn test_parse_error_surfaces_and_clears_buffer() {
        let config = clear_config();
        let packager = unsafe { livepack_new(&config) };
        let buffer = livepack_buffer_new();

        let garbage = [0u8; 16];
        let mut status = unsafe {
            livepack_package_init(packager, garbage.as_ptr(), garbage.len(), buffer)
        };
        assert!(!status.ok);
        unsafe {
            assert_eq!(livepack_buffer_size(buffer), 0);
            livepack_status_free(&mut status);
            livepack_buffer_free(buffer);
            livepack_free(packager);
        }
    }
}
