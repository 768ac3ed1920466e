// src/schema/region.rs

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::LookupError;

/// One of the 14 administrative regions, each stored in every archive
/// as `<number>.csv`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Region {
    Pha,
    Stc,
    Jhc,
    Plk,
    Ulk,
    Hkk,
    Jhm,
    Msk,
    Olk,
    Zlk,
    Vys,
    Pak,
    Lbk,
    Kvk,
}

impl Region {
    pub const ALL: [Region; 14] = [
        Region::Pha,
        Region::Stc,
        Region::Jhc,
        Region::Plk,
        Region::Ulk,
        Region::Hkk,
        Region::Jhm,
        Region::Msk,
        Region::Olk,
        Region::Zlk,
        Region::Vys,
        Region::Pak,
        Region::Lbk,
        Region::Kvk,
    ];

    /// Three-letter mnemonic, e.g. `"JHC"`.
    pub fn code(self) -> &'static str {
        match self {
            Region::Pha => "PHA",
            Region::Stc => "STC",
            Region::Jhc => "JHC",
            Region::Plk => "PLK",
            Region::Ulk => "ULK",
            Region::Hkk => "HKK",
            Region::Jhm => "JHM",
            Region::Msk => "MSK",
            Region::Olk => "OLK",
            Region::Zlk => "ZLK",
            Region::Vys => "VYS",
            Region::Pak => "PAK",
            Region::Lbk => "LBK",
            Region::Kvk => "KVK",
        }
    }

    /// Two-digit identifier used inside the archives.
    pub fn number(self) -> &'static str {
        match self {
            Region::Pha => "00",
            Region::Stc => "01",
            Region::Jhc => "02",
            Region::Plk => "03",
            Region::Ulk => "04",
            Region::Hkk => "05",
            Region::Jhm => "06",
            Region::Msk => "07",
            Region::Olk => "14",
            Region::Zlk => "15",
            Region::Vys => "16",
            Region::Pak => "17",
            Region::Lbk => "18",
            Region::Kvk => "19",
        }
    }

    /// Name of this region's member file inside an archive.
    pub fn member_name(self) -> String {
        format!("{}.csv", self.number())
    }
}

impl FromStr for Region {
    type Err = LookupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        Region::ALL
            .iter()
            .copied()
            .find(|r| r.code() == upper)
            .ok_or_else(|| LookupError::Region(s.to_string()))
    }
}

impl TryFrom<String> for Region {
    type Error = LookupError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Region> for String {
    fn from(region: Region) -> Self {
        region.code().to_string()
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}
