use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of categories predicted by the segmentation network
pub const NUM_CLASSES: usize = 11;

/// Room category predicted for every pixel of a floor plan.
///
/// Discriminants are the class indices of the network output and must stay
/// stable: trained checkpoints depend on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassLabel {
    Background = 0,
    Outdoor = 1,
    Wall = 2,
    Kitchen = 3,
    LivingRoom = 4,
    Bedroom = 5,
    Bathroom = 6,
    Hallway = 7,
    Storage = 8,
    Garage = 9,
    Other = 10,
}

impl ClassLabel {
    pub const ALL: [ClassLabel; NUM_CLASSES] = [
        ClassLabel::Background,
        ClassLabel::Outdoor,
        ClassLabel::Wall,
        ClassLabel::Kitchen,
        ClassLabel::LivingRoom,
        ClassLabel::Bedroom,
        ClassLabel::Bathroom,
        ClassLabel::Hallway,
        ClassLabel::Storage,
        ClassLabel::Garage,
        ClassLabel::Other,
    ];

    /// Look up a label by class index
    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }

    /// Like [`ClassLabel::from_index`], but unknown indices become `Other`
    pub fn from_index_lossy(index: u8) -> Self {
        Self::from_index(index).unwrap_or(ClassLabel::Other)
    }

    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Background => "background",
            Self::Outdoor => "outdoor",
            Self::Wall => "wall",
            Self::Kitchen => "kitchen",
            Self::LivingRoom => "living_room",
            Self::Bedroom => "bedroom",
            Self::Bathroom => "bathroom",
            Self::Hallway => "hallway",
            Self::Storage => "storage",
            Self::Garage => "garage",
            Self::Other => "other",
        }
    }

    /// Background and wall pixels are never reported as rooms
    pub fn is_room(self) -> bool {
        !matches!(self, Self::Background | Self::Wall)
    }

    /// Labels the extractor turns into rooms
    pub fn room_labels() -> impl Iterator<Item = ClassLabel> {
        Self::ALL.into_iter().filter(|label| label.is_room())
    }
}

impl fmt::Display for ClassLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indices_are_stable() {
        for (idx, label) in ClassLabel::ALL.iter().enumerate() {
            assert_eq!(label.index() as usize, idx);
            assert_eq!(ClassLabel::from_index(idx as u8), Some(*label));
        }
        assert_eq!(ClassLabel::from_index(11), None);
        assert_eq!(ClassLabel::from_index_lossy(200), ClassLabel::Other);
    }

    #[test]
    fn test_room_labels_exclude_background_and_wall() {
        let rooms: Vec<_> = ClassLabel::room_labels().collect();
        assert_eq!(rooms.len(), 9);
        assert!(!rooms.contains(&ClassLabel::Background));
        assert!(!rooms.contains(&ClassLabel::Wall));
    }

    #[test]
    fn test_serializes_as_snake_case_name() {
        let json = serde_json::to_string(&ClassLabel::LivingRoom).unwrap();
        assert_eq!(json, "\"living_room\"");
        let back: ClassLabel = serde_json::from_str("\"bedroom\"").unwrap();
        assert_eq!(back, ClassLabel::Bedroom);
        assert_eq!(ClassLabel::LivingRoom.to_string(), "living_room");
    }
}
