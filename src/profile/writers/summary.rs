use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Table of reads that produced no usable alignment: one line per read with
/// the reason. Fed by the processor's summary channel from a dedicated
/// writer thread.
pub struct UnalignedTableWriter {
    writer: BufWriter<File>,
}

impl UnalignedTableWriter {
    pub fn new(path: &Path) -> crate::utils::Result<Self> {
        let file = File::create(path)
            .map_err(|e| format!("Failed to create {}: {}", path.display(), e))?;
        let mut writer = BufWriter::new(file);
        writeln!(writer, "read_id\treason")
            .map_err(|e| format!("Failed to write {}: {}", path.display(), e))?;
        Ok(UnalignedTableWriter { writer })
    }

    pub fn write(&mut self, read_id: &str, reason: &str) -> std::io::Result<()> {
        writeln!(self.writer, "{}\t{}", read_id, reason)
    }

    pub fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("unaligned.txt");
        let mut writer = UnalignedTableWriter::new(&path).unwrap();
        writer.write("read1", "no alignments").unwrap();
        writer.flush().unwrap();
        drop(writer);
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "read_id\treason\nread1\tno alignments\n");
    }
}
