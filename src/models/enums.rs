use crate::store::StoreError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
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
            type Err = StoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(StoreError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(EventType {
    Ultrasound => "ultrasound",
    CtScan => "ct_scan",
    MriScan => "mri_scan",
    PetScan => "pet_scan",
    NuclearMed => "nuclear_med",
    FnaBiopsy => "fna_biopsy",
    MolecularTest => "molecular_test",
    ThyroglobulinLab => "thyroglobulin_lab",
    AntiTgLab => "anti_tg_lab",
    TshLab => "tsh_lab",
    T3Lab => "t3_lab",
    T4Lab => "t4_lab",
    Surgery => "surgery",
    MajorImaging => "major_imaging",
});

str_enum!(SurgeryType {
    TotalThyroidectomy => "total_thyroidectomy",
    Lobectomy => "lobectomy",
    CompletionThyroidectomy => "completion_thyroidectomy",
    NeckDissection => "neck_dissection",
    Other => "other",
});

str_enum!(SurgeryRelationship {
    Preop => "preop",
    Postop => "postop",
    Unrelated => "unrelated",
    NoSurgery => "no_surgery",
});

str_enum!(SpecimenAdequacy {
    Satisfactory => "satisfactory",
    Limited => "limited",
    Unsatisfactory => "unsatisfactory",
});

str_enum!(LabAnalyte {
    Thyroglobulin => "thyroglobulin",
    AntiTg => "anti_tg",
    Tsh => "tsh",
    T3 => "t3",
    T4 => "t4",
});

impl EventType {
    /// Imaging modalities carry ImagingFinding attributes.
    pub fn is_imaging(&self) -> bool {
        matches!(
            self,
            Self::Ultrasound
                | Self::CtScan
                | Self::MriScan
                | Self::PetScan
                | Self::NuclearMed
                | Self::MajorImaging
        )
    }

    pub fn is_cytology(&self) -> bool {
        matches!(self, Self::FnaBiopsy)
    }

    pub fn is_molecular(&self) -> bool {
        matches!(self, Self::MolecularTest)
    }

    pub fn is_lab(&self) -> bool {
        self.lab_analyte().is_some()
    }

    /// The analyte a lab-panel event type reports, if any.
    pub fn lab_analyte(&self) -> Option<LabAnalyte> {
        match self {
            Self::ThyroglobulinLab => Some(LabAnalyte::Thyroglobulin),
            Self::AntiTgLab => Some(LabAnalyte::AntiTg),
            Self::TshLab => Some(LabAnalyte::Tsh),
            Self::T3Lab => Some(LabAnalyte::T3),
            Self::T4Lab => Some(LabAnalyte::T4),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    const ALL_EVENT_TYPES: [EventType; 14] = [
        EventType::Ultrasound,
        EventType::CtScan,
        EventType::MriScan,
        EventType::PetScan,
        EventType::NuclearMed,
        EventType::FnaBiopsy,
        EventType::MolecularTest,
        EventType::ThyroglobulinLab,
        EventType::AntiTgLab,
        EventType::TshLab,
        EventType::T3Lab,
        EventType::T4Lab,
        EventType::Surgery,
        EventType::MajorImaging,
    ];

    #[test]
    fn event_type_roundtrip() {
        for t in ALL_EVENT_TYPES {
            assert_eq!(EventType::from_str(t.as_str()).unwrap(), t);
        }
    }

    #[test]
    fn invalid_enum_value_rejected() {
        let err = EventType::from_str("xray").unwrap_err();
        assert!(matches!(err, StoreError::InvalidEnum { .. }));
    }

    #[test]
    fn modality_predicates_are_disjoint() {
        for t in ALL_EVENT_TYPES {
            let hits = [t.is_imaging(), t.is_cytology(), t.is_molecular(), t.is_lab()]
                .iter()
                .filter(|b| **b)
                .count();
            assert!(hits <= 1, "{} belongs to more than one modality", t.as_str());
        }
    }

    #[test]
    fn lab_analyte_mapping() {
        assert_eq!(
            EventType::ThyroglobulinLab.lab_analyte(),
            Some(LabAnalyte::Thyroglobulin)
        );
        assert_eq!(EventType::TshLab.lab_analyte(), Some(LabAnalyte::Tsh));
        assert_eq!(EventType::Surgery.lab_analyte(), None);
    }

    #[test]
    fn surgery_relationship_strings() {
        assert_eq!(SurgeryRelationship::Preop.as_str(), "preop");
        assert_eq!(SurgeryRelationship::NoSurgery.as_str(), "no_surgery");
    }
}
