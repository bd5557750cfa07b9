// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Synchronous callbacks run on every event before it is handed to the targets.

use crate::constants::{build_info, process, rusage, EVTEL_VERSION};
use crate::event::Event;

/// A callback that may enrich or rewrite an event before delivery.
///
/// Hooks run in registration order, under the client lock, so they must not block.
pub trait Hook: Send + Sync {
    fn on_event(&self, event: &mut Event);
}

impl<F> Hook for F
where
    F: Fn(&mut Event) + Send + Sync,
{
    fn on_event(&self, event: &mut Event) {
        self(event)
    }
}

/// Adds the calling package name and version, the compilation target and the library version
///
/// Use the [`build_info_hook!`](crate::build_info_hook) macro so the package information is
/// captured from the crate that registers the hook.
#[derive(Debug, Clone, Copy)]
pub struct BuildInfoHook {
    package_name: &'static str,
    package_version: &'static str,
}

impl BuildInfoHook {
    pub const fn new(package_name: &'static str, package_version: &'static str) -> Self {
        BuildInfoHook {
            package_name,
            package_version,
        }
    }
}

impl Hook for BuildInfoHook {
    fn on_event(&self, event: &mut Event) {
        event
            .set(build_info::PACKAGE_NAME, self.package_name)
            .set(build_info::PACKAGE_VERSION, self.package_version)
            .set(build_info::TARGET_OS, std::env::consts::OS)
            .set(build_info::TARGET_ARCH, std::env::consts::ARCH)
            .set(build_info::EVTEL_VERSION, EVTEL_VERSION);
    }
}

#[macro_export]
macro_rules! build_info_hook {
    () => {
        $crate::hooks::BuildInfoHook::new(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
    };
}

/// Adds the user and system CPU time consumed by the process so far, in seconds.
pub fn hook_rusage(event: &mut Event) {
    #[cfg(unix)]
    {
        let Some(usage) = self_rusage("hook_rusage") else {
            return;
        };
        event
            .set(rusage::USER_TIME, timeval_secs(&usage.ru_utime))
            .set(rusage::SYSTEM_TIME, timeval_secs(&usage.ru_stime));
    }
    #[cfg(not(unix))]
    let _ = event;
}

/// Adds the peak memory, page fault and context switch counters of the process.
pub fn hook_process_metrics(event: &mut Event) {
    #[cfg(unix)]
    {
        let Some(usage) = self_rusage("hook_process_metrics") else {
            return;
        };
        event
            .set(process::MAX_RSS_BYTES, max_rss_bytes(usage.ru_maxrss))
            .set(process::MINOR_FAULTS, counter(usage.ru_minflt))
            .set(process::MAJOR_FAULTS, counter(usage.ru_majflt))
            .set(process::VOLUNTARY_SWITCHES, counter(usage.ru_nvcsw))
            .set(process::INVOLUNTARY_SWITCHES, counter(usage.ru_nivcsw));
    }
    #[cfg(not(unix))]
    let _ = event;
}

#[cfg(unix)]
fn self_rusage(caller: &str) -> Option<libc::rusage> {
    // SAFETY: rusage is a plain C struct, all zeroes is a valid value
    let mut usage: libc::rusage = unsafe { std::mem::zeroed() };
    // SAFETY: usage is a valid, exclusively borrowed rusage
    if unsafe { libc::getrusage(libc::RUSAGE_SELF, &mut usage) } != 0 {
        crate::evtel_debug!(
            "{}: getrusage failed: {}",
            caller,
            std::io::Error::last_os_error()
        );
        return None;
    }
    Some(usage)
}

#[cfg(unix)]
fn timeval_secs(tv: &libc::timeval) -> f64 {
    tv.tv_sec as f64 + tv.tv_usec as f64 / 1e6
}

#[cfg(unix)]
fn counter(value: libc::c_long) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

/// `ru_maxrss` is in bytes on Apple platforms and in kilobytes elsewhere
#[cfg(unix)]
fn max_rss_bytes(max_rss: libc::c_long) -> u64 {
    let max_rss = counter(max_rss);
    if cfg!(target_vendor = "apple") {
        max_rss
    } else {
        max_rss.saturating_mul(1024)
    }
}
