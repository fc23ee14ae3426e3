/// Returns the device type reported during registration.
///
/// Values match what the Bridge's admin UI groups devices by:
/// `"windows"`, `"macos"`, `"linux"`, or `"unknown"`.
pub fn detect_device_type() -> &'static str {
    #[cfg(target_os = "windows")]
    {
        "windows"
    }

    #[cfg(target_os = "macos")]
    {
        "macos"
    }

    #[cfg(target_os = "linux")]
    {
        "linux"
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
    {
        "unknown"
    }
}
