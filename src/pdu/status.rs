use num_enum::{FromPrimitive, IntoPrimitive};

/// SMPP v3.4 `command_status` values actually produced or consumed by this
/// gateway (Table 5-2 of the SMPP v3.4 specification). Values we never
/// emit are not enumerated; `Other` round-trips anything else so decode
/// never fails because of an unrecognized status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, FromPrimitive)]
#[repr(u32)]
pub enum CommandStatus {
    Ok = 0x0000_0000,
    InvalidCommandLength = 0x0000_0002,
    InvalidCommandId = 0x0000_0003,
    InvalidBindStatus = 0x0000_0004,
    AlreadyBound = 0x0000_0005,
    InvalidPassword = 0x0000_000E,
    BindFailed = 0x0000_000D,
    UnknownError = 0x0000_00FF,
    #[num_enum(catch_all)]
    Other(u32),
}
