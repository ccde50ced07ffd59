// 该文件是 Shanan （山南西风） 项目的一部分。
// src/landmark/topology.rs - 骨架连接拓扑
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

use super::{FullJoint, JointKey, LegacyJoint, Schema};

/// 旧版模型：躯干与下肢
pub const LEGACY_CONNECTIONS: [(LegacyJoint, LegacyJoint); 3] = [
  (LegacyJoint::Shoulder, LegacyJoint::Hip),
  (LegacyJoint::Hip, LegacyJoint::Knee),
  (LegacyJoint::Knee, LegacyJoint::Ankle),
];

/// 33 点模型的标准解剖连接
pub const FULL_CONNECTIONS: [(usize, usize); 32] = [
  // 面部
  (0, 1),
  (1, 2),
  (2, 3),
  (3, 7),
  (0, 4),
  (4, 5),
  (5, 6),
  (6, 8),
  // 肩
  (11, 12),
  // 左臂
  (11, 13),
  (13, 15),
  (15, 17),
  (15, 19),
  (15, 21),
  // 右臂
  (12, 14),
  (14, 16),
  (16, 18),
  (16, 20),
  (16, 22),
  // 躯干
  (11, 23),
  (12, 24),
  (23, 24),
  // 左腿
  (23, 25),
  (25, 27),
  (27, 29),
  (27, 31),
  (29, 31),
  // 右腿
  (24, 26),
  (26, 28),
  (28, 30),
  (28, 32),
  (30, 32),
];

/// 临床关注的关节（肩、髋），绘制时突出显示
pub const FULL_SALIENT: [FullJoint; 4] = [
  FullJoint::LeftShoulder,
  FullJoint::RightShoulder,
  FullJoint::LeftHip,
  FullJoint::RightHip,
];

pub fn connections(schema: Schema) -> Vec<(JointKey, JointKey)> {
  match schema {
    Schema::Legacy(_) => LEGACY_CONNECTIONS
      .iter()
      .map(|&(a, b)| (a.into(), b.into()))
      .collect(),
    Schema::Full => FULL_CONNECTIONS
      .iter()
      .map(|&(a, b)| (a.into(), b.into()))
      .collect(),
  }
}

pub fn is_salient(key: JointKey) -> bool {
  match key {
    JointKey::Index(index) => FULL_SALIENT.iter().any(|j| j.index() == index),
    JointKey::Named(_) => false,
  }
}
