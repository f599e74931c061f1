//! 影像库索引
//!
//! 每种模态一张表，每行把一个影像文件映射到临床标签，并带有“已选”标记。
//! 索引由运行控制器独占持有，选图时按引用传入。

use coherent_core::{Modality, Result, SynthError};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

/// 行标识：模态 + 行号
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RowId {
    pub modality: Modality,
    pub index: usize,
}

/// 影像的临床标签
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageLabels {
    /// 眼底照相：视网膜病变分级与黄斑水肿风险
    Fundus {
        retinopathy_grade: String,
        macular_edema_risk: String,
    },
    /// OCT：病变类别 (CNV / DRUSEN / DME / Normal)
    Oct { class: String },
}

/// 索引中的一行
#[derive(Debug, Clone)]
pub struct ImageLibraryRow {
    /// 已解析为相对索引文件所在目录的路径
    pub path: PathBuf,
    pub labels: ImageLabels,
    pub selected: bool,
}

#[derive(Debug, Deserialize)]
struct FundusRecord {
    #[serde(rename = "File Path")]
    file_path: String,
    #[serde(rename = "Retinopathy grade")]
    retinopathy_grade: String,
    #[serde(rename = "Risk of macular edema")]
    macular_edema_risk: String,
}

#[derive(Debug, Deserialize)]
struct OctRecord {
    #[serde(rename = "File Path")]
    file_path: String,
    #[serde(rename = "Class")]
    class: String,
}

/// 单一模态的影像库索引
#[derive(Debug, Clone)]
pub struct ImageLibraryIndex {
    modality: Modality,
    rows: Vec<ImageLibraryRow>,
}

impl ImageLibraryIndex {
    /// 由内存中的行构建索引
    pub fn from_rows(modality: Modality, rows: Vec<ImageLibraryRow>) -> Self {
        Self { modality, rows }
    }

    /// 读取 CSV 索引文件，路径相对索引文件所在目录解析，所有行初始为未选
    pub fn load<P: AsRef<Path>>(modality: Modality, index_path: P) -> Result<Self> {
        let index_path = index_path.as_ref();
        let base_dir = index_path.parent().unwrap_or_else(|| Path::new("."));

        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(index_path)
            .map_err(|e| SynthError::Index(format!("无法打开索引 {:?}: {}", index_path, e)))?;

        let mut rows = Vec::new();
        match modality {
            Modality::Fundus => {
                for record in reader.deserialize::<FundusRecord>() {
                    let record = record.map_err(|e| SynthError::Index(format!("{:?}: {}", index_path, e)))?;
                    rows.push(ImageLibraryRow {
                        path: base_dir.join(record.file_path),
                        labels: ImageLabels::Fundus {
                            retinopathy_grade: record.retinopathy_grade,
                            macular_edema_risk: record.macular_edema_risk,
                        },
                        selected: false,
                    });
                }
            }
            Modality::Oct => {
                for record in reader.deserialize::<OctRecord>() {
                    let record = record.map_err(|e| SynthError::Index(format!("{:?}: {}", index_path, e)))?;
                    rows.push(ImageLibraryRow {
                        path: base_dir.join(record.file_path),
                        labels: ImageLabels::Oct { class: record.class },
                        selected: false,
                    });
                }
            }
        }

        info!("已加载 {} 影像索引 {:?}，共 {} 行", modality, index_path, rows.len());
        Ok(Self { modality, rows })
    }

    pub fn modality(&self) -> Modality {
        self.modality
    }

    pub fn rows(&self) -> &[ImageLibraryRow] {
        &self.rows
    }

    pub fn row(&self, id: RowId) -> Option<&ImageLibraryRow> {
        if id.modality != self.modality {
            return None;
        }
        self.rows.get(id.index)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// 满足条件且未被选过的行
    pub fn available<F>(&self, filter: F) -> Vec<RowId>
    where
        F: Fn(&ImageLabels) -> bool,
    {
        self.rows
            .iter()
            .enumerate()
            .filter(|(_, row)| !row.selected && filter(&row.labels))
            .map(|(index, _)| RowId { modality: self.modality, index })
            .collect()
    }

    /// 标记为已选，本运行范围内不再被抽中
    pub fn mark_selected(&mut self, id: RowId) {
        if id.modality != self.modality {
            return;
        }
        if let Some(row) = self.rows.get_mut(id.index) {
            row.selected = true;
        }
    }

    /// 清除所有“已选”标记
    pub fn reset_selection(&mut self) {
        for row in &mut self.rows {
            row.selected = false;
        }
    }

    pub fn selected_count(&self) -> usize {
        self.rows.iter().filter(|r| r.selected).count()
    }
}

/// 两种模态的影像库
#[derive(Debug, Clone)]
pub struct ImageLibrary {
    pub fundus: ImageLibraryIndex,
    pub oct: ImageLibraryIndex,
}

impl ImageLibrary {
    pub fn new(fundus: ImageLibraryIndex, oct: ImageLibraryIndex) -> Result<Self> {
        if fundus.modality() != Modality::Fundus || oct.modality() != Modality::Oct {
            return Err(SynthError::Index("索引模态与槽位不匹配".to_string()));
        }
        Ok(Self { fundus, oct })
    }

    /// 读取两个索引文件
    pub fn load<P: AsRef<Path>, Q: AsRef<Path>>(fundus_index: P, oct_index: Q) -> Result<Self> {
        Self::new(
            ImageLibraryIndex::load(Modality::Fundus, fundus_index)?,
            ImageLibraryIndex::load(Modality::Oct, oct_index)?,
        )
    }

    pub fn index(&self, modality: Modality) -> &ImageLibraryIndex {
        match modality {
            Modality::Fundus => &self.fundus,
            Modality::Oct => &self.oct,
        }
    }

    pub fn index_mut(&mut self, modality: Modality) -> &mut ImageLibraryIndex {
        match modality {
            Modality::Fundus => &mut self.fundus,
            Modality::Oct => &mut self.oct,
        }
    }

    pub fn row(&self, id: RowId) -> Option<&ImageLibraryRow> {
        self.index(id.modality).row(id)
    }

    /// 两个索引都清除“已选”标记
    pub fn reset_selection(&mut self) {
        self.fundus.reset_selection();
        self.oct.reset_selection();
    }

    /// 记录当前的“已选”标记
    pub fn selection_snapshot(&self) -> SelectionSnapshot {
        SelectionSnapshot {
            fundus: self.fundus.rows.iter().map(|r| r.selected).collect(),
            oct: self.oct.rows.iter().map(|r| r.selected).collect(),
        }
    }

    /// 恢复到快照时的“已选”标记
    pub fn restore_selection(&mut self, snapshot: SelectionSnapshot) {
        for (row, selected) in self.fundus.rows.iter_mut().zip(snapshot.fundus) {
            row.selected = selected;
        }
        for (row, selected) in self.oct.rows.iter_mut().zip(snapshot.oct) {
            row.selected = selected;
        }
    }
}

/// 两个索引的“已选”标记快照，处理失败的文件不消耗影像
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionSnapshot {
    fundus: Vec<bool>,
    oct: Vec<bool>,
}
