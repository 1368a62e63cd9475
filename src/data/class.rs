use crate::error::CifarError;
use std::fmt;
use std::str::FromStr;

pub const NUM_CLASSES: usize = 10;

/// The ten CIFAR-10 categories, in dataset label order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CifarClass {
    Plane,
    Car,
    Bird,
    Cat,
    Deer,
    Dog,
    Frog,
    Horse,
    Ship,
    Truck,
}

pub const CLASSES: [CifarClass; NUM_CLASSES] = [
    CifarClass::Plane,
    CifarClass::Car,
    CifarClass::Bird,
    CifarClass::Cat,
    CifarClass::Deer,
    CifarClass::Dog,
    CifarClass::Frog,
    CifarClass::Horse,
    CifarClass::Ship,
    CifarClass::Truck,
];

impl CifarClass {
    pub fn from_label(label: u8) -> Option<Self> {
        CLASSES.get(label as usize).copied()
    }

    pub fn label(&self) -> u8 {
        *self as u8
    }

    pub fn name(&self) -> &'static str {
        match self {
            CifarClass::Plane => "plane",
            CifarClass::Car => "car",
            CifarClass::Bird => "bird",
            CifarClass::Cat => "cat",
            CifarClass::Deer => "deer",
            CifarClass::Dog => "dog",
            CifarClass::Frog => "frog",
            CifarClass::Horse => "horse",
            CifarClass::Ship => "ship",
            CifarClass::Truck => "truck",
        }
    }
}

impl fmt::Display for CifarClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CifarClass {
    type Err = CifarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CLASSES
            .iter()
            .find(|class| class.name() == s)
            .copied()
            .ok_or_else(|| CifarError::UnknownClass(s.to_string()))
    }
}
