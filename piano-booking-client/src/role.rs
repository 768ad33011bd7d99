use core::fmt::{self, Display};
use core::str::FromStr;

/// The kind of account a session belongs to.
///
/// Resolved once where the program starts (config, command line or route) and passed down from
/// there, never re-derived from strings deeper in the call tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UserRole {
    Student,
    Teacher,
    ShopOwner,
    HostAdmin,
}

impl UserRole {
    pub const ALL: [Self; 4] = [Self::Student, Self::Teacher, Self::ShopOwner, Self::HostAdmin];

    /// Namespace for everything this role keeps in the local store.
    #[must_use]
    pub const fn storage_prefix(self) -> &'static str {
        match self {
            Self::Student => "student_",
            Self::Teacher => "teacher_",
            Self::ShopOwner => "shop_owner_",
            Self::HostAdmin => "host_admin_",
        }
    }

    #[must_use]
    pub fn auth_token_key(self) -> String {
        format!("{}auth_token", self.storage_prefix())
    }

    #[must_use]
    pub const fn route_prefix(self) -> &'static str {
        match self {
            Self::Student => "/student",
            Self::Teacher => "/teacher",
            Self::ShopOwner => "/shop-owner",
            Self::HostAdmin => "/host-admin",
        }
    }

    /// Path segment of the role's endpoints on the backend.
    #[must_use]
    pub const fn api_segment(self) -> &'static str {
        match self {
            Self::Student => "students",
            Self::Teacher => "teachers",
            Self::ShopOwner => "shop-owners",
            Self::HostAdmin => "host-admins",
        }
    }

    /// Role owning a route such as `/shop-owner/account-rooms`.
    #[must_use]
    pub fn from_route(path: &str) -> Option<Self> {
        let first_segment = path.trim_start_matches('/').split('/').next()?;
        Self::ALL
            .into_iter()
            .find(|role| role.route_prefix().trim_start_matches('/') == first_segment)
    }
}

impl Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.storage_prefix().trim_end_matches('_');
        f.write_str(name)
    }
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[error("unknown role {0:?}, expected one of student, teacher, shop_owner, host_admin")]
pub struct UnknownRole(pub String);

impl FromStr for UserRole {
    type Err = UnknownRole;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "student" => Ok(Self::Student),
            "teacher" => Ok(Self::Teacher),
            "shop_owner" => Ok(Self::ShopOwner),
            "host_admin" => Ok(Self::HostAdmin),
            _ => Err(UnknownRole(input.to_owned())),
        }
    }
}
