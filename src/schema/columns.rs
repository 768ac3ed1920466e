// src/schema/columns.rs

use std::fmt;
use std::str::FromStr;

use crate::error::LookupError;

/// Primitive type of one schema column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float64,
    Utf8,
}

impl ColumnType {
    /// Non-string, non-float columns drop the whole row on a sentinel.
    pub fn drops_row_on_sentinel(self) -> bool {
        !matches!(self, ColumnType::Float64 | ColumnType::Utf8)
    }
}

macro_rules! columns {
    ($($variant:ident => $name:literal : $ty:ident,)+) => {
        /// One column of the fixed accident schema, in source order.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum Column {
            $($variant,)+
        }

        impl Column {
            /// Every schema column in the order it appears in a source row.
            pub const ALL: &'static [Column] = &[$(Column::$variant,)+];

            pub fn name(self) -> &'static str {
                match self {
                    $(Column::$variant => $name,)+
                }
            }

            pub fn ty(self) -> ColumnType {
                match self {
                    $(Column::$variant => ColumnType::$ty,)+
                }
            }
        }
    };
}

columns! {
    P1 => "p1": UInt64,
    P36 => "p36": UInt8,
    P37 => "p37": UInt32,
    P2a => "p2a": Utf8,
    WeekdayP2a => "weekday(p2a)": UInt8,
    P2b => "p2b": UInt16,
    P6 => "p6": UInt8,
    P7 => "p7": UInt8,
    P8 => "p8": UInt8,
    P9 => "p9": UInt8,
    P10 => "p10": UInt8,
    P11 => "p11": UInt8,
    P12 => "p12": UInt16,
    P13a => "p13a": UInt8,
    P13b => "p13b": UInt8,
    P13c => "p13c": UInt8,
    P14 => "p14": UInt32,
    P15 => "p15": UInt8,
    P16 => "p16": UInt8,
    P17 => "p17": UInt8,
    P18 => "p18": UInt8,
    P19 => "p19": UInt8,
    P20 => "p20": UInt8,
    P21 => "p21": UInt8,
    P22 => "p22": UInt8,
    P23 => "p23": UInt8,
    P24 => "p24": UInt8,
    P27 => "p27": UInt8,
    P28 => "p28": UInt8,
    P34 => "p34": UInt8,
    P35 => "p35": UInt8,
    P39 => "p39": UInt8,
    P44 => "p44": UInt8,
    P45a => "p45a": UInt16,
    P47 => "p47": UInt8,
    P48a => "p48a": UInt8,
    P49 => "p49": UInt8,
    P50a => "p50a": UInt8,
    P50b => "p50b": UInt8,
    P51 => "p51": UInt8,
    P52 => "p52": UInt8,
    P53 => "p53": UInt32,
    P55a => "p55a": UInt8,
    P57 => "p57": UInt8,
    P58 => "p58": UInt8,
    A => "a": Float64,
    B => "b": Float64,
    D => "d": Float64,
    E => "e": Float64,
    F => "f": Float64,
    G => "g": Float64,
    H => "h": Utf8,
    I => "i": Utf8,
    J => "j": Utf8,
    K => "k": Utf8,
    L => "l": Utf8,
    N => "n": UInt32,
    O => "o": Utf8,
    P => "p": Utf8,
    Q => "q": Utf8,
    R => "r": UInt32,
    S => "s": UInt32,
    T => "t": Utf8,
    P5a => "p5a": UInt8,
}

/// Name of the derived column holding the 3-letter region code.
pub const REGION_COLUMN: &str = "region";

impl Column {
    /// Position of this column in a source row and in a dataset batch.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_name(name: &str) -> Result<Self, LookupError> {
        Column::ALL
            .iter()
            .copied()
            .find(|c| c.name() == name)
            .ok_or_else(|| LookupError::Column(name.to_string()))
    }
}

impl FromStr for Column {
    type Err = LookupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Column::from_name(s)
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
