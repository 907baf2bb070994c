use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(AppointmentStatus {
    Scheduled => "scheduled",
    Completed => "completed",
    Cancelled => "cancelled",
});

str_enum!(AppointmentKind {
    Routine => "routine",
    Emergency => "emergency",
    FollowUp => "follow_up",
});

str_enum!(LeaveStatus {
    Pending => "pending",
    Approved => "approved",
    Rejected => "rejected",
});

str_enum!(LeaveKind {
    Sick => "sick",
    Casual => "casual",
    Annual => "annual",
    Other => "other",
});

str_enum!(BedType {
    General => "general",
    Icu => "icu",
    Personal => "personal",
});

impl BedType {
    /// Every known bed type. Statistics default each to zero counts.
    pub const ALL: [BedType; 3] = [BedType::General, BedType::Icu, BedType::Personal];
}
