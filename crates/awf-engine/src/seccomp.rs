//! Agent seccomp profile
//!
//! The agent keeps the runtime's baseline but loses the syscalls that could
//! move it out of the sandbox: filesystem re-rooting, tracing, kernel module
//! manipulation, reboot, and raw-socket creation. NET_RAW is dropped as
//! well, so the socket rule is a second fence around the same hole.

use serde_json::{json, Value};

/// Syscalls denied outright.
const DENIED_SYSCALLS: &[&str] = &[
    "mount",
    "umount",
    "umount2",
    "ptrace",
    "chroot",
    "pivot_root",
    "init_module",
    "finit_module",
    "delete_module",
    "reboot",
    "kexec_load",
    "kexec_file_load",
];

/// AF_PACKET, per linux/socket.h.
const AF_PACKET: u64 = 17;

/// Render the seccomp profile document the agent container is started with.
pub fn render_profile() -> Value {
    json!({
        "defaultAction": "SCMP_ACT_ALLOW",
        "syscalls": [
            {
                "names": DENIED_SYSCALLS,
                "action": "SCMP_ACT_ERRNO",
                "errnoRet": 1
            },
            {
                "names": ["socket"],
                "action": "SCMP_ACT_ERRNO",
                "errnoRet": 1,
                "args": [
                    {
                        "index": 0,
                        "value": AF_PACKET,
                        "op": "SCMP_CMP_EQ"
                    }
                ]
            }
        ]
    })
}

/// The profile as the JSON text written next to the run's other artifacts.
pub fn render_profile_text() -> String {
    serde_json::to_string_pretty(&render_profile()).expect("static profile serializes")
}
