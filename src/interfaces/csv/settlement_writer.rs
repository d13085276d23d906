use crate::domain::swap::Settlement;
use crate::error::Result;
use crate::infrastructure::in_memory::BalanceRow;
use std::io::Write;

const SETTLEMENT_HEADER: [&str; 8] = [
    "session",
    "caller",
    "from_token",
    "to_token",
    "gross_amount",
    "commission1",
    "commission2",
    "output",
];

/// Writes settlement records as CSV, one row per settled swap.
pub struct SettlementWriter<W: Write> {
    writer: csv::Writer<W>,
    rows: usize,
}

impl<W: Write> SettlementWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
            rows: 0,
        }
    }

    pub fn write(&mut self, settlement: &Settlement) -> Result<()> {
        self.writer.serialize(settlement)?;
        self.rows += 1;
        Ok(())
    }

    /// Flushes the output; an empty run still gets its header line.
    pub fn finish(mut self) -> Result<()> {
        if self.rows == 0 {
            self.writer.write_record(SETTLEMENT_HEADER)?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

/// Dumps ledger balances as `holder,token,balance`.
pub fn write_balances<W: Write>(sink: W, rows: &[BalanceRow]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(sink);
    for row in rows {
        writer.serialize(row)?;
    }
    if rows.is_empty() {
        writer.write_record(["holder", "token", "balance"])?;
    }
    writer.flush()?;
    Ok(())
}
