//! Kite Ticker Codec
//!
//! Decodes the binary market-data frames and the JSON text messages sent by
//! the Kite ticker.
//!
//! # Binary Frame Layout
//!
//! All integers are big-endian.
//!
//! ```text
//! [u16 packet count] { [u16 packet length] [packet bytes] } ...
//! ```
//!
//! A 1-byte frame is a heartbeat. Packet lengths identify the mode:
//!
//! | Length | Packet                         |
//! |--------|--------------------------------|
//! | 8      | LTP                            |
//! | 28     | Index quote                    |
//! | 32     | Index full (adds timestamp)    |
//! | 44     | Quote                          |
//! | 184    | Full (timestamps, OI, depth)   |
//!
//! Packets of any other length are skipped. Market depth in full packets is
//! not decoded.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::domain::instrument::InstrumentToken;
use crate::domain::tick::{Ohlc, TickMode, TickRecord, percent_change};

const LTP_PACKET: usize = 8;
const INDEX_QUOTE_PACKET: usize = 28;
const INDEX_FULL_PACKET: usize = 32;
const QUOTE_PACKET: usize = 44;
const FULL_PACKET: usize = 184;

const SEGMENT_CDS: u32 = 3;
const SEGMENT_BCD: u32 = 6;
const SEGMENT_INDICES: u32 = 9;

/// Codec errors.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Frame ended before the declared packets did.
    #[error("truncated frame: needed {needed} bytes at offset {offset}, frame is {len}")]
    Truncated {
        /// Offset of the failed read.
        offset: usize,
        /// Bytes the read required.
        needed: usize,
        /// Total frame length.
        len: usize,
    },

    /// Text message was not valid JSON.
    #[error("invalid text message: {0}")]
    Json(#[from] serde_json::Error),
}

/// A decoded binary frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Keep-alive byte.
    Heartbeat,
    /// Decoded packets, in frame order.
    Ticks(Vec<TickRecord>),
}

/// A JSON text message from the ticker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextMessage {
    /// Error reported by the ticker.
    Error(String),
    /// Order postback.
    Order(serde_json::Value),
    /// Informational message.
    Message(String),
    /// Any other message type.
    Other(String),
}

#[derive(Debug, Deserialize)]
struct RawTextMessage {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: serde_json::Value,
}

fn data_to_string(data: serde_json::Value) -> String {
    match data {
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    }
}

/// Decoder for Kite ticker frames.
#[derive(Debug, Default, Clone)]
pub struct KiteCodec;

impl KiteCodec {
    /// Create a new codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Decode a binary frame.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::Truncated` if the frame is shorter than its
    /// header declares.
    pub fn decode_binary(&self, data: &[u8]) -> Result<Frame, CodecError> {
        if data.len() < 2 {
            return Ok(Frame::Heartbeat);
        }

        let frame = Reader::new(data);
        let count = usize::from(frame.u16_at(0)?);
        let mut ticks = Vec::with_capacity(count);
        let mut offset = 2;

        for _ in 0..count {
            let len = usize::from(frame.u16_at(offset)?);
            let packet = frame.slice(offset + 2, len)?;
            offset += 2 + len;

            match decode_packet(packet)? {
                Some(tick) => ticks.push(tick),
                None => tracing::debug!(len, "Skipping packet of unknown length"),
            }
        }

        Ok(Frame::Ticks(ticks))
    }

    /// Decode a text frame.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::Json` if the text is not a `{"type", "data"}` object.
    pub fn decode_text(&self, text: &str) -> Result<TextMessage, CodecError> {
        let raw: RawTextMessage = serde_json::from_str(text)?;
        Ok(match raw.kind.as_str() {
            "error" => TextMessage::Error(data_to_string(raw.data)),
            "order" => TextMessage::Order(raw.data),
            "message" => TextMessage::Message(data_to_string(raw.data)),
            _ => TextMessage::Other(raw.kind),
        })
    }
}

/// Bounds-checked big-endian reads over a byte slice.
struct Reader<'a> {
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    const fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    fn slice(&self, offset: usize, needed: usize) -> Result<&'a [u8], CodecError> {
        self.buf
            .get(offset..offset + needed)
            .ok_or(CodecError::Truncated {
                offset,
                needed,
                len: self.buf.len(),
            })
    }

    fn u16_at(&self, offset: usize) -> Result<u16, CodecError> {
        let bytes = self.slice(offset, 2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    fn u32_at(&self, offset: usize) -> Result<u32, CodecError> {
        let bytes = self.slice(offset, 4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn i32_at(&self, offset: usize) -> Result<i32, CodecError> {
        let bytes = self.slice(offset, 4)?;
        Ok(i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}

/// Decimal places implied by the token's segment.
const fn price_scale(token: InstrumentToken) -> u32 {
    match token & 0xff {
        SEGMENT_CDS => 7,
        SEGMENT_BCD => 4,
        _ => 2,
    }
}

struct PacketFields<'a> {
    reader: Reader<'a>,
    scale: u32,
}

impl PacketFields<'_> {
    fn price(&self, offset: usize) -> Result<Decimal, CodecError> {
        Ok(Decimal::new(i64::from(self.reader.i32_at(offset)?), self.scale))
    }

    fn quantity(&self, offset: usize) -> Result<u64, CodecError> {
        Ok(u64::from(self.reader.u32_at(offset)?))
    }

    fn timestamp(&self, offset: usize) -> Result<Option<DateTime<Utc>>, CodecError> {
        let secs = self.reader.u32_at(offset)?;
        Ok((secs > 0)
            .then(|| DateTime::from_timestamp(i64::from(secs), 0))
            .flatten())
    }
}

fn decode_packet(packet: &[u8]) -> Result<Option<TickRecord>, CodecError> {
    let reader = Reader::new(packet);
    if packet.len() < 4 {
        return Ok(None);
    }
    let token = reader.u32_at(0)?;
    let fields = PacketFields {
        reader,
        scale: price_scale(token),
    };
    let tradable = token & 0xff != SEGMENT_INDICES;

    let tick = match packet.len() {
        LTP_PACKET => TickRecord {
            tradable,
            ..TickRecord::ltp(token, fields.price(4)?)
        },
        INDEX_QUOTE_PACKET | INDEX_FULL_PACKET => decode_index(token, &fields, packet.len())?,
        QUOTE_PACKET | FULL_PACKET => decode_quote(token, tradable, &fields, packet.len())?,
        _ => return Ok(None),
    };

    Ok(Some(tick))
}

fn decode_index(
    token: InstrumentToken,
    fields: &PacketFields<'_>,
    len: usize,
) -> Result<TickRecord, CodecError> {
    let last_price = fields.price(4)?;
    let ohlc = Ohlc {
        high: fields.price(8)?,
        low: fields.price(12)?,
        open: fields.price(16)?,
        close: fields.price(20)?,
    };
    let full = len == INDEX_FULL_PACKET;

    Ok(TickRecord {
        mode: if full { TickMode::Full } else { TickMode::Quote },
        tradable: false,
        ohlc: Some(ohlc),
        change: percent_change(last_price, ohlc.close),
        exchange_timestamp: if full { fields.timestamp(28)? } else { None },
        ..TickRecord::ltp(token, last_price)
    })
}

fn decode_quote(
    token: InstrumentToken,
    tradable: bool,
    fields: &PacketFields<'_>,
    len: usize,
) -> Result<TickRecord, CodecError> {
    let last_price = fields.price(4)?;
    let ohlc = Ohlc {
        open: fields.price(28)?,
        high: fields.price(32)?,
        low: fields.price(36)?,
        close: fields.price(40)?,
    };

    let mut tick = TickRecord {
        mode: TickMode::Quote,
        tradable,
        last_traded_quantity: Some(fields.quantity(8)?),
        average_traded_price: Some(fields.price(12)?),
        volume: Some(fields.quantity(16)?),
        total_buy_quantity: Some(fields.quantity(20)?),
        total_sell_quantity: Some(fields.quantity(24)?),
        ohlc: Some(ohlc),
        change: percent_change(last_price, ohlc.close),
        ..TickRecord::ltp(token, last_price)
    };

    if len == FULL_PACKET {
        tick.mode = TickMode::Full;
        tick.last_trade_time = fields.timestamp(44)?;
        tick.oi = Some(fields.quantity(48)?);
        tick.oi_day_high = Some(fields.quantity(52)?);
        tick.oi_day_low = Some(fields.quantity(56)?);
        tick.exchange_timestamp = fields.timestamp(60)?;
    }

    Ok(tick)
}


#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::test_frames::{frame, packet};
    use super::*;

    // NSE equity tokens end in segment byte 1.
    const NSE_TOKEN: u32 = (2_885 << 8) | 1;

    fn ticks(frame: Frame) -> Vec<TickRecord> {
        match frame {
            Frame::Ticks(ticks) => ticks,
            Frame::Heartbeat => panic!("expected ticks"),
        }
    }

    #[test]
    fn single_byte_is_heartbeat() {
        let codec = KiteCodec::new();
        assert_eq!(codec.decode_binary(&[0]).unwrap(), Frame::Heartbeat);
    }

    #[test]
    fn decodes_ltp_packet() {
        let codec = KiteCodec::new();
        let data = frame(&[packet(8, &[(0, NSE_TOKEN), (4, 250_050)])]);

        let ticks = ticks(codec.decode_binary(&data).unwrap());

        assert_eq!(ticks.len(), 1);
        assert_eq!(ticks[0].token, NSE_TOKEN);
        assert_eq!(ticks[0].mode, TickMode::Ltp);
        assert_eq!(ticks[0].last_price, dec!(2500.50));
        assert!(ticks[0].tradable);
        assert!(ticks[0].volume.is_none());
    }

    #[test]
    fn decodes_full_packet() {
        let codec = KiteCodec::new();
        let data = frame(&[packet(
            184,
            &[
                (0, NSE_TOKEN),
                (4, 11_000),
                (8, 5),
                (12, 10_500),
                (16, 1_200),
                (20, 300),
                (24, 400),
                (28, 10_000),
                (32, 11_500),
                (36, 9_900),
                (40, 10_000),
                (44, 1_704_186_900),
                (48, 7),
                (52, 9),
                (56, 3),
                (60, 1_704_186_901),
            ],
        )]);

        let tick = ticks(codec.decode_binary(&data).unwrap()).remove(0);

        assert_eq!(tick.mode, TickMode::Full);
        assert_eq!(tick.last_price, dec!(110.00));
        assert_eq!(tick.last_traded_quantity, Some(5));
        assert_eq!(tick.average_traded_price, Some(dec!(105.00)));
        assert_eq!(tick.volume, Some(1_200));
        assert_eq!(tick.total_buy_quantity, Some(300));
        assert_eq!(tick.total_sell_quantity, Some(400));
        assert_eq!(
            tick.ohlc,
            Some(Ohlc {
                open: dec!(100),
                high: dec!(115),
                low: dec!(99),
                close: dec!(100),
            })
        );
        assert_eq!(tick.change, dec!(10));
        assert_eq!(tick.oi, Some(7));
        assert_eq!(tick.oi_day_high, Some(9));
        assert_eq!(tick.oi_day_low, Some(3));
        assert_eq!(
            tick.last_trade_time.map(|t| t.timestamp()),
            Some(1_704_186_900)
        );
        assert_eq!(
            tick.exchange_timestamp.map(|t| t.timestamp()),
            Some(1_704_186_901)
        );
    }

    #[test]
    fn quote_packet_has_no_timestamps() {
        let codec = KiteCodec::new();
        let data = frame(&[packet(44, &[(0, NSE_TOKEN), (4, 100), (16, 50)])]);

        let tick = ticks(codec.decode_binary(&data).unwrap()).remove(0);

        assert_eq!(tick.mode, TickMode::Quote);
        assert_eq!(tick.volume, Some(50));
        assert_eq!(tick.change, Decimal::ZERO);
        assert!(tick.exchange_timestamp.is_none());
    }

    #[test]
    fn decodes_index_full_packet() {
        let codec = KiteCodec::new();
        let index_token = (256_265 << 8) | 9;
        let data = frame(&[packet(
            32,
            &[
                (0, index_token),
                (4, 2_200_000),
                (8, 2_210_000),
                (12, 2_190_000),
                (16, 2_195_000),
                (20, 2_000_000),
                (28, 1_704_186_900),
            ],
        )]);

        let tick = ticks(codec.decode_binary(&data).unwrap()).remove(0);

        assert!(!tick.tradable);
        assert_eq!(tick.mode, TickMode::Full);
        assert_eq!(tick.last_price, dec!(22000.00));
        assert_eq!(tick.change, dec!(10));
        assert!(tick.volume.is_none());
        assert!(tick.exchange_timestamp.is_some());
    }

    #[test]
    fn currency_segment_uses_wider_scale() {
        let codec = KiteCodec::new();
        let cds_token = (1_000 << 8) | 3;
        let data = frame(&[packet(8, &[(0, cds_token), (4, 832_512_500)])]);

        let tick = ticks(codec.decode_binary(&data).unwrap()).remove(0);

        assert_eq!(tick.last_price, dec!(83.25125));
    }

    #[test]
    fn multiple_packets_keep_frame_order() {
        let codec = KiteCodec::new();
        let data = frame(&[
            packet(8, &[(0, 102), (4, 100)]),
            packet(8, &[(0, 101), (4, 200)]),
        ]);

        let tokens: Vec<_> = ticks(codec.decode_binary(&data).unwrap())
            .iter()
            .map(|t| t.token)
            .collect();

        assert_eq!(tokens, vec![102, 101]);
    }

    #[test]
    fn unknown_packet_length_is_skipped() {
        let codec = KiteCodec::new();
        let data = frame(&[packet(12, &[(0, 7)]), packet(8, &[(0, 101), (4, 100)])]);

        let ticks = ticks(codec.decode_binary(&data).unwrap());

        assert_eq!(ticks.len(), 1);
        assert_eq!(ticks[0].token, 101);
    }

    #[test]
    fn truncated_frame_is_error() {
        let codec = KiteCodec::new();
        let mut data = frame(&[packet(8, &[(0, 101), (4, 100)])]);
        data.truncate(data.len() - 3);

        assert!(matches!(
            codec.decode_binary(&data),
            Err(CodecError::Truncated { .. })
        ));
    }

    #[test]
    fn decodes_text_messages() {
        let codec = KiteCodec::new();

        assert_eq!(
            codec
                .decode_text(r#"{"type":"error","data":"Invalid access token"}"#)
                .unwrap(),
            TextMessage::Error("Invalid access token".to_string())
        );
        assert!(matches!(
            codec
                .decode_text(r#"{"type":"order","data":{"order_id":"1"}}"#)
                .unwrap(),
            TextMessage::Order(_)
        ));
        assert_eq!(
            codec.decode_text(r#"{"type":"instruments_meta"}"#).unwrap(),
            TextMessage::Other("instruments_meta".to_string())
        );
        assert!(codec.decode_text("not json").is_err());
    }
}
