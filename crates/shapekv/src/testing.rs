//! Shapes shared by the unit tests.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    ArrayProp, AsyncProp, CardinalityHandle, CollectionProp, CompactProp, Entity, HashHandle,
    ListHandle, RefProp, ScalarProp, SetHandle, Shape, ShapeDecl, SortedSetHandle, StorableEnum,
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) enum Status {
    #[default]
    Open = 0,
    Closed = 1,
    Archived = 300,
}

impl StorableEnum for Status {
    const NAME: &'static str = "Status";
    const BITS: u8 = 16;

    fn to_repr(self) -> i64 {
        self as i64
    }

    fn from_repr(repr: i64) -> Option<Self> {
        match repr {
            0 => Some(Status::Open),
            1 => Some(Status::Closed),
            300 => Some(Status::Archived),
            _ => None,
        }
    }
}

crate::storable_enum!(Status);

pub(crate) struct Question;

impl Question {
    pub(crate) const TITLE: ScalarProp<Self, Option<String>> = ScalarProp::new("Title").alias("t");
    pub(crate) const SCORE: ScalarProp<Self, i32> = ScalarProp::new("Score");
    pub(crate) const SCORE_ASYNC: AsyncProp<Self, i32> = AsyncProp::new("ScoreAsync");
    pub(crate) const AUTHOR: RefProp<Self, User> = RefProp::new("Author");
    pub(crate) const TAGS: CollectionProp<Self, SetHandle<String>> = CollectionProp::new("Tags");
    pub(crate) const ANSWERS: CollectionProp<Self, ListHandle<i64>> = CollectionProp::new("Answers");
    pub(crate) const VOTES: CollectionProp<Self, SortedSetHandle<Entity<User>>> =
        CollectionProp::new("Votes");
    pub(crate) const META: CollectionProp<Self, HashHandle<String, i64>> = CollectionProp::new("Meta");
    pub(crate) const VIEWERS: CollectionProp<Self, CardinalityHandle<String>> =
        CollectionProp::new("Viewers");
    pub(crate) const CLOSED: CompactProp<Self, bool> = CompactProp::new("Closed");
    pub(crate) const VIEWS: CompactProp<Self, Option<u16>> = CompactProp::new("Views");
    pub(crate) const STATUS: CompactProp<Self, Status> = CompactProp::new("Status");
    pub(crate) const RATINGS: ArrayProp<Self, i32> = ArrayProp::new("Ratings").page_size(10);
}

impl Shape for Question {
    type Id = i32;
    const NAME: &'static str = "Question";
    const ALIAS: Option<&'static str> = Some("Q");

    fn declare(shape: &mut ShapeDecl<Self>) {
        shape
            .scalar(Self::TITLE)
            .scalar(Self::SCORE)
            .async_scalar(Self::SCORE_ASYNC)
            .reference(Self::AUTHOR)
            .collection(Self::TAGS)
            .collection(Self::ANSWERS)
            .collection(Self::VOTES)
            .collection(Self::META)
            .collection(Self::VIEWERS)
            .compact(Self::CLOSED)
            .compact(Self::VIEWS)
            .compact(Self::STATUS)
            .array(Self::RATINGS);
    }
}

pub(crate) struct User;

impl User {
    pub(crate) const HANDLE: ScalarProp<Self, Option<String>> = ScalarProp::new("Handle");
    pub(crate) const FAVORITE: RefProp<Self, Question> = RefProp::new("Favorite");
    pub(crate) const FOLLOWERS: CollectionProp<Self, SetHandle<Entity<User>>> =
        CollectionProp::new("Followers");
}

impl Shape for User {
    type Id = i64;
    const NAME: &'static str = "User";

    fn declare(shape: &mut ShapeDecl<Self>) {
        shape
            .scalar(Self::HANDLE)
            .reference(Self::FAVORITE)
            .collection(Self::FOLLOWERS);
    }
}

/// One scalar per supported domain.
pub(crate) struct Everything;

impl Everything {
    pub(crate) const BOOL: ScalarProp<Self, bool> = ScalarProp::new("Bool");
    pub(crate) const I8: ScalarProp<Self, i8> = ScalarProp::new("I8");
    pub(crate) const I16: ScalarProp<Self, i16> = ScalarProp::new("I16");
    pub(crate) const I32: ScalarProp<Self, i32> = ScalarProp::new("I32");
    pub(crate) const I64: ScalarProp<Self, i64> = ScalarProp::new("I64");
    pub(crate) const U8: ScalarProp<Self, u8> = ScalarProp::new("U8");
    pub(crate) const U16: ScalarProp<Self, u16> = ScalarProp::new("U16");
    pub(crate) const U32: ScalarProp<Self, u32> = ScalarProp::new("U32");
    pub(crate) const U64: ScalarProp<Self, u64> = ScalarProp::new("U64");
    pub(crate) const F32: ScalarProp<Self, f32> = ScalarProp::new("F32");
    pub(crate) const F64: ScalarProp<Self, f64> = ScalarProp::new("F64");
    pub(crate) const CHAR: ScalarProp<Self, char> = ScalarProp::new("Char");
    pub(crate) const AT: ScalarProp<Self, DateTime<Utc>> = ScalarProp::new("At");
    pub(crate) const UUID: ScalarProp<Self, Uuid> = ScalarProp::new("Uuid");
    pub(crate) const STATUS: ScalarProp<Self, Status> = ScalarProp::new("Status");
    pub(crate) const TEXT: ScalarProp<Self, Option<String>> = ScalarProp::new("Text");
    pub(crate) const BLOB: ScalarProp<Self, Option<Vec<u8>>> = ScalarProp::new("Blob");
    pub(crate) const MAYBE_I32: ScalarProp<Self, Option<i32>> = ScalarProp::new("MaybeI32");
    pub(crate) const MAYBE_AT: ScalarProp<Self, Option<DateTime<Utc>>> = ScalarProp::new("MaybeAt");
    pub(crate) const MAYBE_STATUS: ScalarProp<Self, Option<Status>> =
        ScalarProp::new("MaybeStatus");
}

impl Shape for Everything {
    type Id = u64;
    const NAME: &'static str = "Everything";

    fn declare(shape: &mut ShapeDecl<Self>) {
        shape
            .scalar(Self::BOOL)
            .scalar(Self::I8)
            .scalar(Self::I16)
            .scalar(Self::I32)
            .scalar(Self::I64)
            .scalar(Self::U8)
            .scalar(Self::U16)
            .scalar(Self::U32)
            .scalar(Self::U64)
            .scalar(Self::F32)
            .scalar(Self::F64)
            .scalar(Self::CHAR)
            .scalar(Self::AT)
            .scalar(Self::UUID)
            .scalar(Self::STATUS)
            .scalar(Self::TEXT)
            .scalar(Self::BLOB)
            .scalar(Self::MAYBE_I32)
            .scalar(Self::MAYBE_AT)
            .scalar(Self::MAYBE_STATUS);
    }
}

/// Fixed-width members spread over two compact groups.
pub(crate) struct Packed;

impl Packed {
    pub(crate) const SMALL: CompactProp<Self, i8> = CompactProp::new("Small");
    pub(crate) const PORT: CompactProp<Self, Option<u16>> = CompactProp::new("Port");
    pub(crate) const WIDE: CompactProp<Self, i64> = CompactProp::new("Wide");
    pub(crate) const RATIO: CompactProp<Self, f64> = CompactProp::new("Ratio");
    pub(crate) const GLYPH: CompactProp<Self, char> = CompactProp::new("Glyph");
    pub(crate) const SEEN: CompactProp<Self, Option<DateTime<Utc>>> = CompactProp::new("Seen");
    pub(crate) const TOKEN: CompactProp<Self, Uuid> = CompactProp::new("Token");
    pub(crate) const FLAG: CompactProp<Self, Option<bool>> = CompactProp::new("Flag");
    pub(crate) const LEVEL: CompactProp<Self, u8> = CompactProp::new("Level").group("extra");
}

impl Shape for Packed {
    type Id = i32;
    const NAME: &'static str = "Packed";

    fn declare(shape: &mut ShapeDecl<Self>) {
        shape
            .compact(Self::SMALL)
            .compact(Self::PORT)
            .compact(Self::WIDE)
            .compact(Self::RATIO)
            .compact(Self::GLYPH)
            .compact(Self::SEEN)
            .compact(Self::TOKEN)
            .compact(Self::FLAG)
            .compact(Self::LEVEL);
    }
}

/// Four booleans stored one key each.
pub(crate) struct Sparse;

impl Sparse {
    pub(crate) const FLAGS: [ScalarProp<Self, bool>; 4] = [
        ScalarProp::new("A"),
        ScalarProp::new("B"),
        ScalarProp::new("C"),
        ScalarProp::new("D"),
    ];
}

impl Shape for Sparse {
    type Id = i32;
    const NAME: &'static str = "Sparse";

    fn declare(shape: &mut ShapeDecl<Self>) {
        for flag in Self::FLAGS {
            shape.scalar(flag);
        }
    }
}

/// The same four booleans packed into one group.
pub(crate) struct Dense;

impl Dense {
    pub(crate) const FLAGS: [CompactProp<Self, bool>; 4] = [
        CompactProp::new("A"),
        CompactProp::new("B"),
        CompactProp::new("C"),
        CompactProp::new("D"),
    ];
}

impl Shape for Dense {
    type Id = i32;
    const NAME: &'static str = "Dense";

    fn declare(shape: &mut ShapeDecl<Self>) {
        for flag in Self::FLAGS {
            shape.compact(flag);
        }
    }
}

pub(crate) struct Verbose;

impl Verbose {
    pub(crate) const TITLE: ScalarProp<Self, Option<String>> =
        ScalarProp::new("TitleOfTheQuestion");
    pub(crate) const SCORE: ScalarProp<Self, i32> = ScalarProp::new("ScoreOfTheQuestion");
}

impl Shape for Verbose {
    type Id = i32;
    const NAME: &'static str = "VerboseQuestionShape";

    fn declare(shape: &mut ShapeDecl<Self>) {
        shape.scalar(Self::TITLE).scalar(Self::SCORE);
    }
}

pub(crate) struct Terse;

impl Terse {
    pub(crate) const TITLE: ScalarProp<Self, Option<String>> =
        ScalarProp::new("TitleOfTheQuestion").alias("t");
    pub(crate) const SCORE: ScalarProp<Self, i32> = ScalarProp::new("ScoreOfTheQuestion").alias("s");
}

impl Shape for Terse {
    type Id = i32;
    const NAME: &'static str = "TerseQuestionShape";
    const ALIAS: Option<&'static str> = Some("T");

    fn declare(shape: &mut ShapeDecl<Self>) {
        shape.scalar(Self::TITLE).scalar(Self::SCORE);
    }
}

/// Keyed by UUID; never created through the counter.
pub(crate) struct Document;

impl Document {
    pub(crate) const BODY: ScalarProp<Self, Option<String>> = ScalarProp::new("Body");
}

impl Shape for Document {
    type Id = Uuid;
    const NAME: &'static str = "Document";

    fn declare(shape: &mut ShapeDecl<Self>) {
        shape.scalar(Self::BODY);
    }
}

/// Keyed by text, so one id can extend another's keys.
pub(crate) struct Note;

impl Note {
    pub(crate) const SCORE: ScalarProp<Self, i32> = ScalarProp::new("Score");
    pub(crate) const ARR: ArrayProp<Self, i32> = ArrayProp::new("Arr").page_size(4);
}

impl Shape for Note {
    type Id = String;
    const NAME: &'static str = "Note";
    const ALIAS: Option<&'static str> = Some("N");

    fn declare(shape: &mut ShapeDecl<Self>) {
        shape.scalar(Self::SCORE).array(Self::ARR);
    }
}

/// Declares a text member in a compact group, which cannot be packed.
pub(crate) struct Malformed;

impl Malformed {
    pub(crate) const NOTE: CompactProp<Self, Option<String>> = CompactProp::new("Note");
}

impl Shape for Malformed {
    type Id = i32;
    const NAME: &'static str = "Malformed";

    fn declare(shape: &mut ShapeDecl<Self>) {
        shape.compact(Self::NOTE);
    }
}

/// Claims the alias already used by [`Question`].
pub(crate) struct Impostor;

impl Shape for Impostor {
    type Id = i32;
    const NAME: &'static str = "Impostor";
    const ALIAS: Option<&'static str> = Some("Q");

    fn declare(_shape: &mut ShapeDecl<Self>) {}
}

/// Route `tracing` output through the test harness.
pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}
