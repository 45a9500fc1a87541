//! MQ binary arithmetic coder.
//!
//! Interval subdivision over a 16-bit interval register `A` kept in
//! `[0x8000, 0x10000)` between symbols, with a 28-bit code register on the
//! encode side and a 32-bit one on the decode side. Bytes equal to 0xFF are
//! followed by a 7-bit byte (bit stuffing); a carry out of the code register
//! propagates into the last buffered byte. Probability adaptation walks a
//! 47-entry state table shared by all contexts; each coder instance owns its
//! own `(state, mps)` register per context.

#[derive(Clone, Copy)]
struct Transition {
    qe: u16,
    nmps: u8,
    nlps: u8,
    switch: bool,
}

const fn t(qe: u16, nmps: u8, nlps: u8, switch: u8) -> Transition {
    Transition {
        qe,
        nmps,
        nlps,
        switch: switch == 1,
    }
}

/// Probability estimation state machine.
const TRANSITIONS: [Transition; 47] = [
    t(0x5601, 1, 1, 1),
    t(0x3401, 2, 6, 0),
    t(0x1801, 3, 9, 0),
    t(0x0AC1, 4, 12, 0),
    t(0x0521, 5, 29, 0),
    t(0x0221, 38, 33, 0),
    t(0x5601, 7, 6, 1),
    t(0x5401, 8, 14, 0),
    t(0x4801, 9, 14, 0),
    t(0x3801, 10, 14, 0),
    t(0x3001, 11, 17, 0),
    t(0x2401, 12, 18, 0),
    t(0x1C01, 13, 20, 0),
    t(0x1601, 29, 21, 0),
    t(0x5601, 15, 14, 1),
    t(0x5401, 16, 14, 0),
    t(0x5101, 17, 15, 0),
    t(0x4801, 18, 16, 0),
    t(0x3801, 19, 17, 0),
    t(0x3401, 20, 18, 0),
    t(0x3001, 21, 19, 0),
    t(0x2801, 22, 19, 0),
    t(0x2401, 23, 19, 0),
    t(0x2201, 24, 19, 0),
    t(0x1C01, 25, 20, 0),
    t(0x1801, 26, 21, 0),
    t(0x1601, 27, 22, 0),
    t(0x1401, 28, 23, 0),
    t(0x1201, 29, 24, 0),
    t(0x1101, 30, 25, 0),
    t(0x0AC1, 31, 26, 0),
    t(0x09C1, 32, 27, 0),
    t(0x08A1, 33, 28, 0),
    t(0x0521, 34, 29, 0),
    t(0x0441, 35, 30, 0),
    t(0x02A1, 36, 31, 0),
    t(0x0221, 37, 32, 0),
    t(0x0141, 38, 33, 0),
    t(0x0111, 39, 34, 0),
    t(0x0085, 40, 35, 0),
    t(0x0049, 41, 36, 0),
    t(0x0025, 42, 37, 0),
    t(0x0015, 43, 38, 0),
    t(0x0009, 44, 39, 0),
    t(0x0005, 45, 40, 0),
    t(0x0001, 45, 41, 0),
    t(0x5601, 46, 46, 0),
];

/// Adaptive probability register for one context.
#[derive(Clone, Copy, Default)]
struct Context {
    state: u8,
    mps: u8,
}

#[derive(Clone, Default)]
struct ContextSet {
    ctx: Vec<Context>,
}

impl ContextSet {
    fn new(count: usize) -> Self {
        Self {
            ctx: vec![Context::default(); count],
        }
    }

    fn set(&mut self, cx: usize, state: u8, mps: u8) {
        self.ctx[cx] = Context { state, mps };
    }
}

pub struct MqEncoder {
    a: u32,
    c: u32,
    ct: u32,
    /// Last produced byte, held back so a carry can still reach it.
    pending: Option<u8>,
    out: Vec<u8>,
    contexts: ContextSet,
}

impl MqEncoder {
    pub fn new(context_count: usize) -> Self {
        Self {
            a: 0x8000,
            c: 0,
            ct: 12,
            pending: None,
            out: Vec::new(),
            contexts: ContextSet::new(context_count),
        }
    }

    /// Seed one context register before coding starts.
    pub fn set_context(&mut self, cx: usize, state: u8, mps: u8) {
        self.contexts.set(cx, state, mps);
    }

    /// Encode one binary decision under context `cx`.
    pub fn encode(&mut self, bit: u8, cx: usize) {
        let Context { state, mps } = self.contexts.ctx[cx];
        let tr = TRANSITIONS[state as usize];
        let qe = tr.qe as u32;

        self.a -= qe;
        if bit == mps {
            if self.a & 0x8000 != 0 {
                // Interval still normalized; nothing else to do.
                self.c += qe;
                return;
            }
            if self.a < qe {
                // Conditional exchange: MPS takes the smaller sub-interval.
                self.a = qe;
            } else {
                self.c += qe;
            }
            self.contexts.ctx[cx].state = tr.nmps;
        } else {
            if self.a < qe {
                self.c += qe;
            } else {
                self.a = qe;
            }
            if tr.switch {
                self.contexts.ctx[cx].mps = 1 - mps;
            }
            self.contexts.ctx[cx].state = tr.nlps;
        }
        self.renormalize();
    }

    fn renormalize(&mut self) {
        loop {
            self.a <<= 1;
            self.c <<= 1;
            self.ct -= 1;
            if self.ct == 0 {
                self.byte_out();
            }
            if self.a & 0x8000 != 0 {
                break;
            }
        }
    }

    fn byte_out(&mut self) {
        if self.pending == Some(0xFF) {
            // The byte after 0xFF carries 7 data bits.
            self.shift_out(20, 7);
            return;
        }
        if self.c & 0x0800_0000 != 0 {
            // Carry into the held-back byte. The interval invariant keeps the
            // very first byte carry-free, so a pending byte must exist.
            let b = self.pending.unwrap_or(0).wrapping_add(1);
            self.pending = Some(b);
            self.c &= 0x07FF_FFFF;
            if b == 0xFF {
                self.shift_out(20, 7);
                return;
            }
        }
        self.shift_out(19, 8);
    }

    fn shift_out(&mut self, shift: u32, bits: u32) {
        if let Some(b) = self.pending.take() {
            self.out.push(b);
        }
        self.pending = Some((self.c >> shift) as u8);
        self.c &= (1 << shift) - 1;
        self.ct = bits;
    }

    /// Terminate the stream: force decodable trailing bits, drain the pending
    /// byte and strip trailing 0xFF (the decoder synthesizes them back).
    pub fn finish(mut self) -> Vec<u8> {
        let upper = self.c + self.a;
        self.c |= 0xFFFF;
        if self.c >= upper {
            self.c -= 0x8000;
        }
        self.c <<= self.ct;
        self.byte_out();
        self.c <<= self.ct;
        self.byte_out();
        if let Some(b) = self.pending.take() {
            self.out.push(b);
        }
        while self.out.last() == Some(&0xFF) {
            self.out.pop();
        }
        self.out
    }
}

pub struct MqDecoder<'a> {
    a: u32,
    c: u32,
    ct: u32,
    data: &'a [u8],
    /// Index of the byte most recently fed into `c`.
    pos: usize,
    contexts: ContextSet,
}

impl<'a> MqDecoder<'a> {
    pub fn new(data: &'a [u8], context_count: usize) -> Self {
        let mut dec = Self {
            a: 0,
            c: 0,
            ct: 0,
            data,
            pos: 0,
            contexts: ContextSet::new(context_count),
        };
        let first = dec.data.first().copied().unwrap_or(0xFF);
        dec.c = (first as u32) << 16;
        dec.byte_in();
        dec.c <<= 7;
        dec.ct -= 7;
        dec.a = 0x8000;
        dec
    }

    /// Seed one context register; must mirror the encoder's seeding.
    pub fn set_context(&mut self, cx: usize, state: u8, mps: u8) {
        self.contexts.set(cx, state, mps);
    }

    /// Decode one binary decision under context `cx`.
    pub fn decode(&mut self, cx: usize) -> u8 {
        let Context { state, mps } = self.contexts.ctx[cx];
        let tr = TRANSITIONS[state as usize];
        let qe = tr.qe as u32;

        self.a -= qe;
        let bit;
        if (self.c >> 16) < qe {
            // Lower sub-interval: LPS, or MPS under conditional exchange.
            if self.a < qe {
                bit = mps;
                self.contexts.ctx[cx].state = tr.nmps;
            } else {
                bit = 1 - mps;
                if tr.switch {
                    self.contexts.ctx[cx].mps = 1 - mps;
                }
                self.contexts.ctx[cx].state = tr.nlps;
            }
            self.a = qe;
            self.renormalize();
        } else {
            self.c -= qe << 16;
            if self.a & 0x8000 == 0 {
                if self.a < qe {
                    bit = 1 - mps;
                    if tr.switch {
                        self.contexts.ctx[cx].mps = 1 - mps;
                    }
                    self.contexts.ctx[cx].state = tr.nlps;
                } else {
                    bit = mps;
                    self.contexts.ctx[cx].state = tr.nmps;
                }
                self.renormalize();
            } else {
                bit = mps;
            }
        }
        bit
    }

    fn renormalize(&mut self) {
        loop {
            if self.ct == 0 {
                self.byte_in();
            }
            self.a <<= 1;
            self.c <<= 1;
            self.ct -= 1;
            if self.a & 0x8000 != 0 {
                break;
            }
        }
    }

    fn byte_in(&mut self) {
        if self.pos >= self.data.len() {
            // Past the end: keep feeding 1-bits.
            self.c += 0xFF00;
            self.ct = 8;
            return;
        }
        if self.data[self.pos] == 0xFF {
            let next = self.data.get(self.pos + 1).copied().unwrap_or(0xFF);
            if next > 0x8F {
                // Marker territory; do not consume, feed 1-bits.
                self.c += 0xFF00;
                self.ct = 8;
            } else {
                self.pos += 1;
                self.c += (self.data[self.pos] as u32) << 9;
                self.ct = 7;
            }
        } else {
            self.pos += 1;
            match self.data.get(self.pos) {
                Some(&b) => {
                    self.c += (b as u32) << 8;
                    self.ct = 8;
                }
                None => {
                    self.c += 0xFF00;
                    self.ct = 8;
                }
            }
        }
    }
}
