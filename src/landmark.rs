// 该文件是 Shanan （山南西风） 项目的一部分。
// src/landmark.rs - 关键点模型
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use serde_json::Value;
use tracing::debug;

use crate::scale::{ReferenceFrame, ReferenceSpace};

pub mod topology;

/// 关键点可用的最低可见度
pub const VISIBILITY_THRESHOLD: f64 = 0.5;

/// 旧版四点模型使用的参考分辨率
pub const LEGACY_REFERENCE_FRAME: ReferenceFrame = ReferenceFrame {
  width: 1920.0,
  height: 1080.0,
};

/// 单个检测到的关键点，坐标位于所属模型声明的参考空间中
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Landmark {
  pub x: f64,
  pub y: f64,
  /// 置信度 [0, 1]，未报告时视为始终可见
  pub visibility: Option<f64>,
}

impl Landmark {
  pub const fn new(x: f64, y: f64) -> Self {
    Self {
      x,
      y,
      visibility: None,
    }
  }

  pub const fn with_visibility(x: f64, y: f64, visibility: f64) -> Self {
    Self {
      x,
      y,
      visibility: Some(visibility),
    }
  }

  pub fn is_usable(&self) -> bool {
    self.visibility.is_none_or(|v| v >= VISIBILITY_THRESHOLD)
  }

  fn from_json(value: &Value) -> Option<Self> {
    let obj = value.as_object()?;
    let x = obj.get("x")?.as_f64().filter(|v| v.is_finite())?;
    let y = obj.get("y")?.as_f64().filter(|v| v.is_finite())?;
    let visibility = obj
      .get("visibility")
      .and_then(Value::as_f64)
      .filter(|v| v.is_finite());
    Some(Self { x, y, visibility })
  }
}

/// 旧版模型的四个命名关节
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum LegacyJoint {
  Shoulder = 0,
  Hip = 1,
  Knee = 2,
  Ankle = 3,
}

impl LegacyJoint {
  pub const COUNT: usize = 4;
  pub const ALL: [LegacyJoint; Self::COUNT] = [
    LegacyJoint::Shoulder,
    LegacyJoint::Hip,
    LegacyJoint::Knee,
    LegacyJoint::Ankle,
  ];

  pub fn name(&self) -> &'static str {
    match self {
      LegacyJoint::Shoulder => "shoulder",
      LegacyJoint::Hip => "hip",
      LegacyJoint::Knee => "knee",
      LegacyJoint::Ankle => "ankle",
    }
  }

  pub fn from_name(name: &str) -> Option<Self> {
    Self::ALL.into_iter().find(|j| j.name() == name)
  }
}

/// 33 点全身模型的关节索引
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum FullJoint {
  Nose = 0,
  LeftEyeInner = 1,
  LeftEye = 2,
  LeftEyeOuter = 3,
  RightEyeInner = 4,
  RightEye = 5,
  RightEyeOuter = 6,
  LeftEar = 7,
  RightEar = 8,
  MouthLeft = 9,
  MouthRight = 10,
  LeftShoulder = 11,
  RightShoulder = 12,
  LeftElbow = 13,
  RightElbow = 14,
  LeftWrist = 15,
  RightWrist = 16,
  LeftPinky = 17,
  RightPinky = 18,
  LeftIndex = 19,
  RightIndex = 20,
  LeftThumb = 21,
  RightThumb = 22,
  LeftHip = 23,
  RightHip = 24,
  LeftKnee = 25,
  RightKnee = 26,
  LeftAnkle = 27,
  RightAnkle = 28,
  LeftHeel = 29,
  RightHeel = 30,
  LeftFootIndex = 31,
  RightFootIndex = 32,
}

impl FullJoint {
  pub const COUNT: usize = 33;

  pub fn index(self) -> usize {
    self as usize
  }
}

/// 访问关节的键：旧版使用名称，全身模型使用索引
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JointKey {
  Named(LegacyJoint),
  Index(usize),
}

impl From<LegacyJoint> for JointKey {
  fn from(joint: LegacyJoint) -> Self {
    JointKey::Named(joint)
  }
}

impl From<FullJoint> for JointKey {
  fn from(joint: FullJoint) -> Self {
    JointKey::Index(joint.index())
  }
}

impl From<usize> for JointKey {
  fn from(index: usize) -> Self {
    JointKey::Index(index)
  }
}

/// 关键点集合的模型标签
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Schema {
  Legacy(ReferenceFrame),
  Full,
}

impl Schema {
  pub fn legacy() -> Self {
    Schema::Legacy(LEGACY_REFERENCE_FRAME)
  }

  pub fn reference_space(&self) -> ReferenceSpace {
    match *self {
      Schema::Legacy(frame) => ReferenceSpace::Frame(frame),
      Schema::Full => ReferenceSpace::Normalized,
    }
  }
}

type FullJoints = Box<[Option<Landmark>; FullJoint::COUNT]>;

/// 一次拍摄检测出的关键点集合，始终携带其模型标签
#[derive(Debug, Clone, PartialEq)]
pub enum LandmarkSet {
  Legacy {
    frame: ReferenceFrame,
    joints: [Option<Landmark>; LegacyJoint::COUNT],
  },
  Full {
    joints: FullJoints,
  },
}

impl LandmarkSet {
  pub fn empty(schema: Schema) -> Self {
    match schema {
      Schema::Legacy(frame) => LandmarkSet::Legacy {
        frame,
        joints: [None; LegacyJoint::COUNT],
      },
      Schema::Full => LandmarkSet::Full {
        joints: Box::new([None; FullJoint::COUNT]),
      },
    }
  }

  pub fn legacy(
    frame: ReferenceFrame,
    points: impl IntoIterator<Item = (LegacyJoint, Landmark)>,
  ) -> Self {
    let mut joints = [None; LegacyJoint::COUNT];
    for (joint, landmark) in points {
      joints[joint as usize] = Some(landmark);
    }
    LandmarkSet::Legacy { frame, joints }
  }

  /// 超出 0..33 的索引被忽略
  pub fn full(points: impl IntoIterator<Item = (usize, Landmark)>) -> Self {
    let mut joints: FullJoints = Box::new([None; FullJoint::COUNT]);
    for (index, landmark) in points {
      if let Some(slot) = joints.get_mut(index) {
        *slot = Some(landmark);
      }
    }
    LandmarkSet::Full { joints }
  }

  /// 按声明的模型解析检测服务返回的关键点。
  ///
  /// 缺失或非数值的关节留空，整体格式不符时返回空集合，不会报错。
  pub fn from_json(schema: Schema, value: &Value) -> Self {
    let set = match (schema, value) {
      (Schema::Full, Value::Array(items)) => Self::full(
        items
          .iter()
          .enumerate()
          .filter_map(|(i, v)| Landmark::from_json(v).map(|lm| (i, lm))),
      ),
      (Schema::Full, Value::Object(map)) => Self::full(map.iter().filter_map(|(k, v)| {
        let index = k.parse::<usize>().ok()?;
        Landmark::from_json(v).map(|lm| (index, lm))
      })),
      (Schema::Legacy(frame), Value::Object(map)) => {
        Self::legacy(
          frame,
          map.iter().filter_map(|(k, v)| {
            let joint = LegacyJoint::from_name(k)?;
            Landmark::from_json(v).map(|lm| (joint, lm))
          }),
        )
      }
      _ => {
        debug!("关键点数据格式不符，按空集合处理: {:?}", schema);
        Self::empty(schema)
      }
    };
    debug!("解析关键点 {} 个", set.len());
    set
  }

  pub fn schema(&self) -> Schema {
    match self {
      LandmarkSet::Legacy { frame, .. } => Schema::Legacy(*frame),
      LandmarkSet::Full { .. } => Schema::Full,
    }
  }

  /// 模型不匹配的键（如在全身模型上按名称访问）返回 `None`
  pub fn get(&self, key: impl Into<JointKey>) -> Option<&Landmark> {
    match (self, key.into()) {
      (LandmarkSet::Legacy { joints, .. }, JointKey::Named(joint)) => joints[joint as usize].as_ref(),
      (LandmarkSet::Full { joints }, JointKey::Index(index)) => joints.get(index)?.as_ref(),
      _ => None,
    }
  }

  /// 存在且可见度达标的关节
  pub fn get_usable(&self, key: impl Into<JointKey>) -> Option<&Landmark> {
    self.get(key).filter(|lm| lm.is_usable())
  }

  pub fn iter(&self) -> Box<dyn Iterator<Item = (JointKey, &Landmark)> + '_> {
    match self {
      LandmarkSet::Legacy { joints, .. } => Box::new(
        LegacyJoint::ALL
          .into_iter()
          .zip(joints.iter())
          .filter_map(|(j, lm)| lm.as_ref().map(|lm| (JointKey::Named(j), lm))),
      ),
      LandmarkSet::Full { joints } => Box::new(
        joints
          .iter()
          .enumerate()
          .filter_map(|(i, lm)| lm.as_ref().map(|lm| (JointKey::Index(i), lm))),
      ),
    }
  }

  pub fn usable(&self) -> impl Iterator<Item = (JointKey, &Landmark)> + '_ {
    self.iter().filter(|(_, lm)| lm.is_usable())
  }

  pub fn len(&self) -> usize {
    self.iter().count()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}
