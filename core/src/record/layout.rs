//! Fixed binary layout shared by the record variants.
//!
//! Offsets (little endian):
//!
//! | offset | size | field                                   |
//! |-------:|-----:|-----------------------------------------|
//! | 0      | 1    | context                                 |
//! | 1      | 1    | version                                 |
//! | 2      | 2    | species                                 |
//! | 4      | 1    | form                                    |
//! | 5      | 1    | flags (egg, was egg, nicknamed, go, lock) |
//! | 6      | 2    | held item                               |
//! | 8      | 1    | language                                |
//! | 9      | 1    | current handler                         |
//! | 10     | 8    | HOME tracker                            |
//! | 18     | 3    | met date (year - 2000, month, day)      |
//! | 21     | 3    | egg met date                            |
//! | 24     | 24   | nickname (UTF-8, zero padded)           |
//! | 48     | 24   | original trainer name                   |
//! | 72     | 1    | original trainer gender                 |
//! | 73     | 24   | handling trainer name                   |
//! | 97     | 1    | handling trainer gender                 |
//! | 98     | 1    | handling trainer language               |
//!
//! The remainder up to the variant size is reserved and zero.

use bytes::Buf;
use bytes::BufMut;
use bytes::BytesMut;
use chrono::Datelike;
use chrono::NaiveDate;
use linktrade_utils_string::take_bytes_at_char_boundary;

use super::EntityContext;
use super::EntityCore;
use super::TrainerIdentity;

pub(crate) const CORE_LEN: usize = 99;
const NAME_LEN: usize = 24;

const FLAG_EGG: u8 = 1 << 0;
const FLAG_WAS_EGG: u8 = 1 << 1;
const FLAG_NICKNAMED: u8 = 1 << 2;
const FLAG_GO: u8 = 1 << 3;
const FLAG_TRADE_LOCK: u8 = 1 << 4;

pub(crate) fn encode_core(core: &EntityCore, size: usize, keep_handling_language: bool) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(size);
    buf.put_u8(core.context.to_byte());
    buf.put_u8(core.version);
    buf.put_u16_le(core.species);
    buf.put_u8(core.form);
    buf.put_u8(flags(core));
    buf.put_u16_le(core.held_item);
    buf.put_u8(core.language);
    buf.put_u8(core.current_handler);
    buf.put_u64_le(core.home_tracker);
    put_date(&mut buf, core.met_date);
    put_date(&mut buf, core.egg_met_date);
    put_name(&mut buf, &core.nickname);
    put_name(&mut buf, &core.original_trainer.name);
    buf.put_u8(core.original_trainer.gender);
    put_name(&mut buf, &core.handling_trainer.name);
    buf.put_u8(core.handling_trainer.gender);
    buf.put_u8(if keep_handling_language {
        core.handling_language
    } else {
        0
    });
    buf.resize(size, 0);
    buf.to_vec()
}

pub(crate) fn decode_core(data: &[u8]) -> Option<EntityCore> {
    if data.len() < CORE_LEN {
        return None;
    }
    let mut cur = data;
    let context = EntityContext::from_byte(cur.get_u8())?;
    let version = cur.get_u8();
    let species = cur.get_u16_le();
    let form = cur.get_u8();
    let flags = cur.get_u8();
    let held_item = cur.get_u16_le();
    let language = cur.get_u8();
    let current_handler = cur.get_u8();
    let home_tracker = cur.get_u64_le();
    let met_date = get_date(&mut cur);
    let egg_met_date = get_date(&mut cur);
    let nickname = get_name(&mut cur)?;
    let ot_name = get_name(&mut cur)?;
    let ot_gender = cur.get_u8();
    let ht_name = get_name(&mut cur)?;
    let ht_gender = cur.get_u8();
    let handling_language = cur.get_u8();

    Some(EntityCore {
        context,
        version,
        species,
        form,
        is_egg: flags & FLAG_EGG != 0,
        was_egg: flags & FLAG_WAS_EGG != 0,
        is_nicknamed: flags & FLAG_NICKNAMED != 0,
        nickname,
        held_item,
        language,
        from_go: flags & FLAG_GO != 0,
        trade_locked: flags & FLAG_TRADE_LOCK != 0,
        home_tracker,
        original_trainer: TrainerIdentity {
            name: ot_name,
            gender: ot_gender,
        },
        handling_trainer: TrainerIdentity {
            name: ht_name,
            gender: ht_gender,
        },
        handling_language,
        current_handler,
        met_date,
        egg_met_date,
    })
}

fn flags(core: &EntityCore) -> u8 {
    let mut flags = 0;
    for (set, bit) in [
        (core.is_egg, FLAG_EGG),
        (core.was_egg, FLAG_WAS_EGG),
        (core.is_nicknamed, FLAG_NICKNAMED),
        (core.from_go, FLAG_GO),
        (core.trade_locked, FLAG_TRADE_LOCK),
    ] {
        if set {
            flags |= bit;
        }
    }
    flags
}

fn put_name(buf: &mut BytesMut, name: &str) {
    let bytes = take_bytes_at_char_boundary(name, NAME_LEN).as_bytes();
    buf.put_slice(bytes);
    buf.put_bytes(0, NAME_LEN - bytes.len());
}

fn get_name(cur: &mut &[u8]) -> Option<String> {
    let raw = &cur[..NAME_LEN];
    let end = raw.iter().position(|b| *b == 0).unwrap_or(NAME_LEN);
    let name = std::str::from_utf8(&raw[..end]).ok()?.to_string();
    cur.advance(NAME_LEN);
    Some(name)
}

fn put_date(buf: &mut BytesMut, date: Option<NaiveDate>) {
    match date {
        Some(date) => {
            let year = u8::try_from(date.year() - 2000).unwrap_or(0);
            buf.put_u8(year);
            buf.put_u8(date.month() as u8);
            buf.put_u8(date.day() as u8);
        }
        None => buf.put_bytes(0, 3),
    }
}

fn get_date(cur: &mut &[u8]) -> Option<NaiveDate> {
    let year = cur.get_u8();
    let month = cur.get_u8();
    let day = cur.get_u8();
    if month == 0 || day == 0 {
        return None;
    }
    NaiveDate::from_ymd_opt(2000 + i32::from(year), u32::from(month), u32::from(day))
}
