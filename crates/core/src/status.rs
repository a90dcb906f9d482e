//! Status helper enums mapping to SMALLINT lookup tables.
//!
//! Each enum variant's discriminant matches the seed data order (1-based)
//! in the corresponding `*_statuses` database table, and its label matches
//! the seeded `name` column.

/// Status ID type matching SMALLINT/SMALLSERIAL in the database.
pub type StatusId = i16;

macro_rules! define_status_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $val:expr => $label:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[repr(i16)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $val ),+
        }

        impl $name {
            /// Return the database status ID.
            pub fn id(self) -> StatusId {
                self as StatusId
            }

            /// Look up a variant by its database status ID.
            pub fn from_id(id: StatusId) -> Option<Self> {
                $( if id == $val { return Some(Self::$variant); } )+
                None
            }

            /// Lowercase label used on the wire and in the lookup table.
            pub fn as_str(self) -> &'static str {
                match self {
                    $( Self::$variant => $label ),+
                }
            }
        }

        impl From<$name> for StatusId {
            fn from(value: $name) -> Self {
                value as StatusId
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }
    };
}

define_status_enum! {
    /// Project lifecycle status. Only active projects accept mutations.
    ProjectStatus {
        Active = 1 => "active",
        Archived = 2 => "archived",
    }
}

define_status_enum! {
    /// Task lifecycle status.
    ///
    /// `Pending -> Claimed -> {Done, Pending (retry), Failed}`; `Done` and
    /// `Failed` are terminal.
    TaskStatus {
        Pending = 1 => "pending",
        Claimed = 2 => "claimed",
        Done = 3 => "done",
        Failed = 4 => "failed",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_status_ids_match_seed_order() {
        assert_eq!(TaskStatus::Pending.id(), 1);
        assert_eq!(TaskStatus::Claimed.id(), 2);
        assert_eq!(TaskStatus::Done.id(), 3);
        assert_eq!(TaskStatus::Failed.id(), 4);
    }

    #[test]
    fn from_id_round_trips_and_rejects_unknown() {
        for status in [
            TaskStatus::Pending,
            TaskStatus::Claimed,
            TaskStatus::Done,
            TaskStatus::Failed,
        ] {
            assert_eq!(TaskStatus::from_id(status.id()), Some(status));
        }
        assert_eq!(TaskStatus::from_id(0), None);
        assert_eq!(ProjectStatus::from_id(3), None);
    }

    #[test]
    fn serializes_as_label() {
        let json = serde_json::to_value(TaskStatus::Claimed).unwrap();
        assert_eq!(json, serde_json::json!("claimed"));
        assert_eq!(ProjectStatus::Archived.to_string(), "archived");
    }
}
