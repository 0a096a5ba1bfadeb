use crate::error::{PipelineError, Result};
use crate::utils::constants::DEFAULT_ROW_GROUP_SIZE;
use crate::writers::schema::Snapshot;
use arrow::compute::concat_batches;
use arrow::record_batch::RecordBatch;
use arrow::util::display::{ArrayFormatter, FormatOptions};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, GzipLevel};
use parquet::file::properties::WriterProperties;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::debug;

pub struct ParquetWriter {
    compression: Compression,
    row_group_size: usize,
}

impl ParquetWriter {
    pub fn new() -> Self {
        Self {
            compression: Compression::SNAPPY,
            row_group_size: DEFAULT_ROW_GROUP_SIZE,
        }
    }

    pub fn with_compression(mut self, compression: &str) -> Result<Self> {
        self.compression = match compression.to_lowercase().as_str() {
            "snappy" => Compression::SNAPPY,
            "gzip" => Compression::GZIP(GzipLevel::default()),
            "lz4" => Compression::LZ4,
            "zstd" => Compression::ZSTD(parquet::basic::ZstdLevel::default()),
            "none" => Compression::UNCOMPRESSED,
            _ => {
                return Err(PipelineError::Config(format!(
                    "Unsupported compression: {}",
                    compression
                )))
            }
        };
        Ok(self)
    }

    pub fn with_row_group_size(mut self, size: usize) -> Self {
        self.row_group_size = size;
        self
    }

    /// Persist a stage table as `<dir>/<T::FILE_NAME>`
    pub fn write_snapshot<T: Snapshot>(&self, table: &T, dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let path = dir.join(T::FILE_NAME);

        let batch = table.to_batch()?;
        self.write_batch(&batch, &path)?;

        debug!(path = %path.display(), rows = table.row_count(), "Snapshot written");
        Ok(path)
    }

    /// Write a batch atomically: the file only appears once the writer has
    /// closed cleanly
    pub fn write_batch(&self, batch: &RecordBatch, path: &Path) -> Result<()> {
        let tmp_path = tmp_path_for(path);

        let result = self.write_batch_to(batch, &tmp_path);
        if let Err(e) = result {
            let _ = fs::remove_file(&tmp_path);
            return Err(e);
        }

        fs::rename(&tmp_path, path)?;
        Ok(())
    }

    fn write_batch_to(&self, batch: &RecordBatch, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        let props = WriterProperties::builder()
            .set_compression(self.compression)
            .set_max_row_group_size(self.row_group_size)
            .build();

        let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
        writer.write(batch)?;
        writer.close()?;

        Ok(())
    }

    /// Read every record batch of a Parquet file
    pub fn read_batches(&self, path: &Path) -> Result<Vec<RecordBatch>> {
        let file = File::open(path).map_err(|e| {
            PipelineError::Snapshot(format!("Failed to open {}: {}", path.display(), e))
        })?;
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;

        let mut batches = Vec::new();
        for batch in reader {
            batches.push(batch?);
        }
        Ok(batches)
    }

    /// Read a whole Parquet file as one batch, keeping the schema stored in the file
    pub fn read_batch(&self, path: &Path) -> Result<RecordBatch> {
        let file = File::open(path).map_err(|e| {
            PipelineError::Snapshot(format!("Failed to open {}: {}", path.display(), e))
        })?;
        let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
        let schema = builder.schema().clone();

        let mut batches = Vec::new();
        for batch in builder.build()? {
            batches.push(batch?);
        }
        Ok(concat_batches(&schema, &batches)?)
    }

    pub fn read_snapshot<T: Snapshot>(&self, path: &Path) -> Result<T> {
        let batches = self.read_batches(path)?;
        T::from_batches(&batches)
    }

    /// Read the first `limit` rows as display strings, header row first
    pub fn read_sample_rows(&self, path: &Path, limit: usize) -> Result<Vec<Vec<String>>> {
        let file = File::open(path)?;
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)?
            .with_batch_size(limit.clamp(1, 8192))
            .build()?;

        let options = FormatOptions::default().with_null("null");
        let mut rows = Vec::new();

        for batch_result in reader {
            let batch = batch_result?;

            if rows.is_empty() {
                rows.push(
                    batch
                        .schema()
                        .fields()
                        .iter()
                        .map(|f| f.name().clone())
                        .collect(),
                );
            }

            let formatters = batch
                .columns()
                .iter()
                .map(|c| ArrayFormatter::try_new(c.as_ref(), &options))
                .collect::<std::result::Result<Vec<_>, _>>()?;

            for i in 0..batch.num_rows() {
                if rows.len() > limit {
                    return Ok(rows);
                }
                rows.push(formatters.iter().map(|f| f.value(i).to_string()).collect());
            }
        }

        Ok(rows)
    }

    /// Get file statistics
    pub fn get_file_info(&self, path: &Path) -> Result<ParquetFileInfo> {
        use parquet::file::reader::{FileReader, SerializedFileReader};

        let file = File::open(path)?;
        let reader = SerializedFileReader::new(file)?;
        let metadata = reader.metadata();

        let file_metadata = metadata.file_metadata();
        let row_groups = metadata.num_row_groups();
        let total_rows = file_metadata.num_rows();
        let file_size = fs::metadata(path)?.len();

        let mut row_group_sizes = Vec::new();
        for i in 0..row_groups {
            let rg_metadata = metadata.row_group(i);
            row_group_sizes.push(rg_metadata.num_rows());
        }

        let schema = file_metadata.schema_descr();
        let columns = (0..schema.num_columns())
            .map(|i| schema.column(i).path().string())
            .collect();

        let compression = if row_groups > 0 && metadata.row_group(0).num_columns() > 0 {
            metadata.row_group(0).column(0).compression()
        } else {
            self.compression
        };

        Ok(ParquetFileInfo {
            total_rows,
            row_groups: row_groups as i32,
            row_group_sizes,
            file_size,
            compression,
            columns,
        })
    }
}

impl Default for ParquetWriter {
    fn default() -> Self {
        Self::new()
    }
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

#[derive(Debug)]
pub struct ParquetFileInfo {
    pub total_rows: i64,
    pub row_groups: i32,
    pub row_group_sizes: Vec<i64>,
    pub file_size: u64,
    pub compression: Compression,
    pub columns: Vec<String>,
}

impl ParquetFileInfo {
    pub fn summary(&self) -> String {
        let avg_rows = if self.row_groups > 0 {
            self.total_rows as f64 / self.row_groups as f64
        } else {
            0.0
        };

        format!(
            "Parquet File Summary:\n\
            - Total rows: {}\n\
            - Row groups: {}\n\
            - Columns ({}): {}\n\
            - File size: {:.2} MB\n\
            - Compression: {:?}\n\
            - Avg rows per group: {:.0}",
            self.total_rows,
            self.row_groups,
            self.columns.len(),
            self.columns.join(", "),
            self.file_size as f64 / 1_048_576.0, // Convert to MB
            self.compression,
            avg_rows
        )
    }
}
