//! 预约状态机
//!
//! 管理预约从待确认到完成/取消的生命周期状态转换

use collex_core::{codes, AppointmentStatus, CollexError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 预约状态转换事件
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AppointmentEvent {
    Confirm,
    Complete,
    Cancel,
}

/// 预约状态机
#[derive(Debug)]
pub struct AppointmentStateMachine {
    transitions: HashMap<(AppointmentStatus, AppointmentEvent), AppointmentStatus>,
}

impl AppointmentStateMachine {
    /// 创建新的状态机实例
    pub fn new() -> Self {
        use AppointmentEvent::*;
        use AppointmentStatus::*;

        let mut transitions = HashMap::new();

        // 定义状态转换规则
        transitions.insert((Pending, Confirm), Confirmed);
        transitions.insert((Pending, Complete), Completed);
        transitions.insert((Confirmed, Complete), Completed);
        transitions.insert((Pending, Cancel), Cancelled);
        transitions.insert((Confirmed, Cancel), Cancelled);

        Self { transitions }
    }

    /// 检查状态转换是否有效
    pub fn can_transition(&self, from: AppointmentStatus, event: AppointmentEvent) -> bool {
        self.transitions.contains_key(&(from, event))
    }

    /// 执行状态转换
    pub fn transition(&self, from: AppointmentStatus, event: AppointmentEvent) -> Result<AppointmentStatus> {
        if let Some(to) = self.transitions.get(&(from, event)) {
            return Ok(*to);
        }

        Err(match (from, event) {
            (AppointmentStatus::Cancelled, AppointmentEvent::Cancel) => {
                CollexError::invalid(codes::ALREADY_CANCELLED, "Appointment is already cancelled")
            }
            (AppointmentStatus::Completed, _) => {
                CollexError::invalid(codes::ALREADY_COMPLETED, "Appointment is already completed")
            }
            _ => CollexError::invalid(
                codes::INVALID_STATUS_TRANSITION,
                format!("Cannot {:?} an appointment that is {}", event, from.as_str()),
            ),
        })
    }

    /// 获取状态的所有可能事件
    pub fn get_possible_events(&self, current_state: AppointmentStatus) -> Vec<AppointmentEvent> {
        self.transitions
            .keys()
            .filter(|(state, _)| *state == current_state)
            .map(|(_, event)| *event)
            .collect()
    }
}

impl Default for AppointmentStateMachine {
    fn default() -> Self {
        Self::new()
    }
}
