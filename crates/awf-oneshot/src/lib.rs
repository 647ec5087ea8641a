//! One-shot secret tokens
//!
//! Loaded ahead of the agent's libc via `LD_PRELOAD`, this library
//! interposes `getenv`. On the first lookup of a named secret the real value
//! is cached in process memory and the variable is removed from the process
//! environment block, so raw scans of `environ` come up empty while lookups
//! through `getenv` keep working. Setting `AWF_ONE_SHOT_SKIP_UNSET=1` turns
//! the shim into a pure passthrough for diagnostics.
//!
//! The name list is configuration: the compiled-in defaults are extended
//! through the comma-separated `AWF_ONE_SHOT_VARS` variable.

use libc::c_char;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::ffi::{CStr, CString};
use std::sync::Mutex;

/// Secret names handled by default; kept in sync with the engine's policy.
const DEFAULT_SECRET_VARS: &[&str] = &[
    "GITHUB_TOKEN",
    "GITHUB_PERSONAL_ACCESS_TOKEN",
    "COPILOT_GITHUB_TOKEN",
    "OPENAI_API_KEY",
    "ANTHROPIC_API_KEY",
];

const EXTRA_VARS_NAME: &str = "AWF_ONE_SHOT_VARS";
const SKIP_UNSET_NAME: &str = "AWF_ONE_SHOT_SKIP_UNSET";

type GetenvFn = unsafe extern "C" fn(*const c_char) -> *mut c_char;

/// Address of libc's own getenv, resolved once past this library.
static REAL_GETENV: Lazy<usize> = Lazy::new(|| unsafe {
    libc::dlsym(
        libc::RTLD_NEXT,
        b"getenv\0".as_ptr() as *const c_char,
    ) as usize
});

/// Values already captured; the CString heap buffers stay put for the life
/// of the process so returned pointers remain valid.
static CACHE: Lazy<Mutex<HashMap<String, CString>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Names beyond the defaults, read from the environment once.
static EXTRA_VARS: Lazy<Vec<String>> = Lazy::new(|| {
    let raw = lookup_real(EXTRA_VARS_NAME);
    parse_extra_vars(raw.as_deref())
});

static SKIP_UNSET: Lazy<bool> =
    Lazy::new(|| lookup_real(SKIP_UNSET_NAME).as_deref() == Some("1"));

fn real_getenv(name: *const c_char) -> *mut c_char {
    let addr = *REAL_GETENV;
    if addr == 0 {
        return std::ptr::null_mut();
    }
    let func: GetenvFn = unsafe { std::mem::transmute::<usize, GetenvFn>(addr) };
    unsafe { func(name) }
}

/// Real-getenv lookup by Rust string, for the shim's own configuration.
fn lookup_real(name: &str) -> Option<String> {
    let c_name = CString::new(name).ok()?;
    let raw = real_getenv(c_name.as_ptr());
    if raw.is_null() {
        return None;
    }
    unsafe { CStr::from_ptr(raw) }
        .to_str()
        .ok()
        .map(str::to_owned)
}

fn parse_extra_vars(raw: Option<&str>) -> Vec<String> {
    raw.map(|list| {
        list.split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_owned)
            .collect()
    })
    .unwrap_or_default()
}

fn is_secret(name: &str) -> bool {
    DEFAULT_SECRET_VARS.contains(&name) || EXTRA_VARS.iter().any(|n| n == name)
}

/// The interposed getenv.
///
/// # Safety
///
/// Called by arbitrary C code; `name` follows the libc getenv contract.
#[no_mangle]
pub unsafe extern "C" fn getenv(name: *const c_char) -> *mut c_char {
    if name.is_null() {
        return std::ptr::null_mut();
    }

    let Ok(key) = CStr::from_ptr(name).to_str() else {
        return real_getenv(name);
    };

    if *SKIP_UNSET || !is_secret(key) {
        return real_getenv(name);
    }

    let mut cache = CACHE.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    if let Some(value) = cache.get(key) {
        return value.as_ptr() as *mut c_char;
    }

    let raw = real_getenv(name);
    if raw.is_null() {
        return std::ptr::null_mut();
    }
    let value = CStr::from_ptr(raw).to_owned();

    // First read: clear the variable from the environment block, keep
    // serving it from the cache.
    libc::unsetenv(name);

    let entry = cache.entry(key.to_owned()).or_insert(value);
    entry.as_ptr() as *mut c_char
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_names_are_secret() {
        assert!(is_secret("GITHUB_TOKEN"));
        assert!(is_secret("ANTHROPIC_API_KEY"));
        assert!(!is_secret("HOME"));
        assert!(!is_secret("PATH"));
    }

    #[test]
    fn test_extra_var_parsing() {
        assert_eq!(
            parse_extra_vars(Some("FOO_TOKEN, BAR_KEY ,,")),
            vec!["FOO_TOKEN".to_string(), "BAR_KEY".to_string()]
        );
        assert!(parse_extra_vars(None).is_empty());
        assert!(parse_extra_vars(Some("")).is_empty());
    }

    #[test]
    fn test_cache_round_trip() {
        std::env::set_var("GITHUB_TOKEN", "s3cret");
        let name = CString::new("GITHUB_TOKEN").unwrap();

        let first = unsafe { getenv(name.as_ptr()) };
        assert!(!first.is_null());
        let value = unsafe { CStr::from_ptr(first) }.to_str().unwrap();
        assert_eq!(value, "s3cret");

        // The raw environment block no longer carries the value, but the
        // cached lookup still does.
        assert!(std::env::var("GITHUB_TOKEN").is_err());
        let second = unsafe { getenv(name.as_ptr()) };
        assert_eq!(
            unsafe { CStr::from_ptr(second) }.to_str().unwrap(),
            "s3cret"
        );
    }

    #[test]
    fn test_non_secret_passthrough() {
        std::env::set_var("AWF_ONESHOT_TEST_PLAIN", "visible");
        let name = CString::new("AWF_ONESHOT_TEST_PLAIN").unwrap();
        let raw = unsafe { getenv(name.as_ptr()) };
        assert!(!raw.is_null());
        assert_eq!(
            unsafe { CStr::from_ptr(raw) }.to_str().unwrap(),
            "visible"
        );
        assert_eq!(std::env::var("AWF_ONESHOT_TEST_PLAIN").unwrap(), "visible");
    }
}
