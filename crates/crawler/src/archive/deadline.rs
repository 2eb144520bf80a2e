//! 컨테이너 읽기에 전달하는 취소 토큰 + 만료 시각

use std::cell::Cell;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::error::ArchiveError;

/// 컨테이너 하나를 여는 동안 유효한 기한
///
/// 크롤 전체의 취소 토큰에서 파생한 자식 토큰과 자체 만료 시각을 함께 가집니다.
/// 부모가 취소되면 함께 취소되지만, 만료는 이 컨테이너에만 적용됩니다.
/// 리더는 엔트리를 하나 넘길 때마다 [`Deadline::check`]를 호출합니다.
#[derive(Debug)]
pub struct Deadline {
    token: CancellationToken,
    timeout: Option<Duration>,
    expires_at: Cell<Option<Instant>>,
}

impl Deadline {
    /// 만료 없이 취소만 따르는 기한
    pub fn unbounded(parent: &CancellationToken) -> Self {
        Self {
            token: parent.child_token(),
            timeout: None,
            expires_at: Cell::new(None),
        }
    }

    /// 지금부터 `timeout` 뒤에 만료되는 기한
    pub fn after(timeout: Duration, parent: &CancellationToken) -> Self {
        Self {
            token: parent.child_token(),
            timeout: Some(timeout),
            expires_at: Cell::new(Instant::now().checked_add(timeout)),
        }
    }

    /// 만료 시각을 지금부터 다시 `timeout` 뒤로 미룹니다.
    ///
    /// 워커는 중첩 엔트리 처리를 마칠 때마다 호출하여, 자식 컨테이너에 쓴 시간이
    /// 부모 컨테이너의 기한을 소모하지 않도록 합니다.
    pub fn rearm(&self) {
        if let Some(timeout) = self.timeout {
            self.expires_at.set(Instant::now().checked_add(timeout));
        }
    }

    /// 이 기한만 취소합니다 (부모 토큰에는 영향 없음).
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// 취소 또는 만료 여부를 확인합니다.
    pub fn check(&self) -> Result<(), ArchiveError> {
        if self.token.is_cancelled() {
            return Err(ArchiveError::Cancelled);
        }
        if let Some(at) = self.expires_at.get()
            && Instant::now() >= at
        {
            return Err(ArchiveError::Timeout);
        }
        Ok(())
    }
}
