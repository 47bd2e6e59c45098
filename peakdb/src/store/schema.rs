//! The tables used by the store.
//!
//! Interval coordinates are absolute: chromosome-local positions shifted by
//! the owning chromosome's global offset. `BedVirtual` is the spatial index
//! over those absolute coordinates; it is a 32-bit integer R*-tree, which
//! caps the coordinate line at `i32::MAX` (enforced at registration).

pub const ASSEMBLY: &str = "
    CREATE TABLE IF NOT EXISTS Assembly (
        AssemblyId INTEGER PRIMARY KEY AUTOINCREMENT,
        Assembly   TEXT UNIQUE NOT NULL,
        Species    TEXT,
        AbsPath    TEXT NOT NULL,
        Size       INTEGER NOT NULL
    )";

pub const CHROMOSOME: &str = "
    CREATE TABLE IF NOT EXISTS Chromosome (
        ChromosomeId INTEGER PRIMARY KEY AUTOINCREMENT,
        Chromosome   TEXT NOT NULL,
        Size         INTEGER NOT NULL,
        Offset       INTEGER NOT NULL,
        AssemblyId   INTEGER NOT NULL,
        FOREIGN KEY(AssemblyId) REFERENCES Assembly(AssemblyId)
    )";

pub const CONDITION: &str = "
    CREATE TABLE IF NOT EXISTS Condition (
        ConditionId INTEGER PRIMARY KEY AUTOINCREMENT,
        Condition   TEXT
    )";

pub const BED: &str = "
    CREATE TABLE IF NOT EXISTS Bed (
        BedId        INTEGER PRIMARY KEY AUTOINCREMENT,
        ChromosomeId INTEGER NOT NULL,
        ConditionId  INTEGER NOT NULL,
        ChromStart   INTEGER NOT NULL,
        ChromEnd     INTEGER NOT NULL,
        Summit       INTEGER,
        DataValue    REAL,
        FOREIGN KEY(ChromosomeId) REFERENCES Chromosome(ChromosomeId),
        FOREIGN KEY(ConditionId)  REFERENCES Condition(ConditionId)
    )";

pub const BED_VIRTUAL: &str = "
    CREATE VIRTUAL TABLE IF NOT EXISTS BedVirtual
    USING rtree_i32(BedId, ChromStart, ChromEnd)";

pub const ALL: &[&str] = &[ASSEMBLY, CHROMOSOME, CONDITION, BED, BED_VIRTUAL];
