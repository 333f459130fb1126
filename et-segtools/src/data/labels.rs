//! 标签名与标签 ID 之间的双射.

use std::collections::HashMap;
use std::ops::RangeInclusive;

use crate::consts::LabelId;
use crate::error::{SegError, SegResult};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 有序的 "标签名 -> 正整数 ID" 双射.
///
/// 第 `i` 个名字 (从 0 开始) 的 ID 恒为 `i + 1`, 因此 ID 天然唯一,
/// 且 0 (背景) 永远不会被占用. 构建后不可变.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "Vec<String>", into = "Vec<String>"))]
pub struct LabelMap {
    names: Vec<String>,
    #[cfg_attr(feature = "serde", serde(skip))]
    ids: HashMap<String, LabelId>,
}

impl LabelMap {
    /// 按顺序从标签名构建. 名字为空, 含换行, 重复, 或个数超过 `LabelId`
    /// 的表示范围时返回 `Err`.
    pub fn from_names<S, I>(names: I) -> SegResult<Self>
    where
        S: Into<String>,
        I: IntoIterator<Item = S>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        if names.len() > LabelId::MAX as usize {
            return Err(SegError::invalid(
                "labels",
                format!("at most {} labels are supported", LabelId::MAX),
            ));
        }

        let mut ids = HashMap::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            if name.is_empty() || name.contains('\n') {
                return Err(SegError::invalid(
                    "labels",
                    format!("`{name:?}` is not a valid label name"),
                ));
            }
            if ids.insert(name.clone(), (i + 1) as LabelId).is_some() {
                return Err(SegError::DuplicateLabel(name.clone()));
            }
        }
        Ok(Self { names, ids })
    }

    /// 标签个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// 是否不含任何标签.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// 最大的已注册 ID. 没有标签时为 0.
    #[inline]
    pub fn max_id(&self) -> LabelId {
        self.names.len() as LabelId
    }

    /// 查询标签名对应的 ID.
    #[inline]
    pub fn id_of(&self, name: &str) -> Option<LabelId> {
        self.ids.get(name).copied()
    }

    /// 查询 ID 对应的标签名. 0 或未注册的 ID 返回 `None`.
    #[inline]
    pub fn name_of(&self, id: LabelId) -> Option<&str> {
        (id as usize)
            .checked_sub(1)
            .and_then(|i| self.names.get(i))
            .map(String::as_str)
    }

    /// 是否包含 `name`.
    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.ids.contains_key(name)
    }

    /// 按 ID 升序排列的标签名.
    #[inline]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// 按 ID 升序迭代 `(名字, ID)`.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = (&str, LabelId)> {
        self.names
            .iter()
            .enumerate()
            .map(|(i, n)| (n.as_str(), (i + 1) as LabelId))
    }

    /// 按 ID 升序迭代所有已注册的 ID.
    #[inline]
    pub fn ids(&self) -> RangeInclusive<LabelId> {
        1..=self.max_id()
    }

    /// 查询 ID, 找不到时返回带有全部已知标签的 [`SegError::LabelNotFound`].
    pub fn require(&self, name: &str) -> SegResult<LabelId> {
        self.id_of(name)
            .ok_or_else(|| SegError::LabelNotFound(name.to_owned(), self.names.clone()))
    }
}

impl TryFrom<Vec<String>> for LabelMap {
    type Error = SegError;

    fn try_from(value: Vec<String>) -> Result<Self, Self::Error> {
        Self::from_names(value)
    }
}

impl From<LabelMap> for Vec<String> {
    fn from(value: LabelMap) -> Self {
        value.names
    }
}
