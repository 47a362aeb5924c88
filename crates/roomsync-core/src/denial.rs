//! Access denial codes.
//!
//! The server reports denials as open-ended strings. They are parsed into a
//! closed set with an explicit [`DenialCode::Unknown`] fallback so callers
//! match on variants instead of string contents.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Reason a room activation was denied.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DenialCode {
    /// No authenticated identity.
    NotAuthenticated,
    /// Membership check reported the user is not a clan member.
    NotMember,
    /// Membership check could not be completed.
    MembershipCheckFailed,
    /// User is banned from the clan.
    ClanBanned,
    /// User is banned from the community.
    CommunityBanned,
    /// Clan chat is private.
    PrivateClan,
    /// Community chat is private.
    PrivateCommunity,
    /// Code not known to this client, kept verbatim.
    Unknown(String),
}

/// How a denial should be presented to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenialCategory {
    /// Sign in first.
    SignIn,
    /// Request to join the clan.
    RequestToJoin,
    /// Banned from the room.
    Banned,
    /// Room is locked.
    Locked,
    /// Transient failure, re-entering the room may succeed.
    Retry,
    /// Unrecognized code.
    Unknown,
}

impl DenialCode {
    /// Parse a wire code. Unrecognized codes map to [`DenialCode::Unknown`].
    pub fn parse(code: &str) -> Self {
        match code {
            "NOT_AUTHENTICATED" => Self::NotAuthenticated,
            "NOT_MEMBER" => Self::NotMember,
            "MEMBERSHIP_CHECK_FAILED" => Self::MembershipCheckFailed,
            "CLAN_BANNED" => Self::ClanBanned,
            "COMMUNITY_BANNED" => Self::CommunityBanned,
            "PRIVATE_CLAN" => Self::PrivateClan,
            "PRIVATE_COMMUNITY" => Self::PrivateCommunity,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// Wire code.
    pub fn as_str(&self) -> &str {
        match self {
            Self::NotAuthenticated => "NOT_AUTHENTICATED",
            Self::NotMember => "NOT_MEMBER",
            Self::MembershipCheckFailed => "MEMBERSHIP_CHECK_FAILED",
            Self::ClanBanned => "CLAN_BANNED",
            Self::CommunityBanned => "COMMUNITY_BANNED",
            Self::PrivateClan => "PRIVATE_CLAN",
            Self::PrivateCommunity => "PRIVATE_COMMUNITY",
            Self::Unknown(code) => code,
        }
    }

    /// Presentation category.
    pub fn category(&self) -> DenialCategory {
        match self {
            Self::NotAuthenticated => DenialCategory::SignIn,
            Self::NotMember => DenialCategory::RequestToJoin,
            Self::ClanBanned | Self::CommunityBanned => DenialCategory::Banned,
            Self::PrivateClan | Self::PrivateCommunity => DenialCategory::Locked,
            Self::MembershipCheckFailed => DenialCategory::Retry,
            Self::Unknown(_) => DenialCategory::Unknown,
        }
    }
}

impl From<String> for DenialCode {
    fn from(code: String) -> Self {
        Self::parse(&code)
    }
}

impl From<DenialCode> for String {
    fn from(code: DenialCode) -> Self {
        match code {
            DenialCode::Unknown(code) => code,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for DenialCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
