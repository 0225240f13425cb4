use std::ops::BitOr;
use std::ops::BitOrAssign;

use crate::texture::ArrayClass;

/// Which array classes a command invalidated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChangedFlags {
    pub albedo: bool,
    pub normal: bool,
}

impl ChangedFlags {
    pub const NONE: ChangedFlags = ChangedFlags {
        albedo: false,
        normal: false,
    };
    pub const BOTH: ChangedFlags = ChangedFlags {
        albedo: true,
        normal: true,
    };

    pub fn only(class: ArrayClass) -> Self {
        match class {
            ArrayClass::Albedo => ChangedFlags {
                albedo: true,
                normal: false,
            },
            ArrayClass::Normal => ChangedFlags {
                albedo: false,
                normal: true,
            },
        }
    }

    pub fn get(self, class: ArrayClass) -> bool {
        match class {
            ArrayClass::Albedo => self.albedo,
            ArrayClass::Normal => self.normal,
        }
    }

    pub(crate) fn clear(&mut self, class: ArrayClass) {
        match class {
            ArrayClass::Albedo => self.albedo = false,
            ArrayClass::Normal => self.normal = false,
        }
    }

    pub fn any(self) -> bool {
        self.albedo || self.normal
    }
}

impl BitOr for ChangedFlags {
    type Output = ChangedFlags;

    fn bitor(self, rhs: Self) -> Self::Output {
        ChangedFlags {
            albedo: self.albedo || rhs.albedo,
            normal: self.normal || rhs.normal,
        }
    }
}

impl BitOrAssign for ChangedFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        *self = *self | rhs;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArrayState {
    Clean,
    /// Never built, or an input changed since the last successful build.
    #[default]
    Dirty,
}

/// Per-class clean/dirty state. Only a successful build of a class moves it
/// back to clean.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirtyTracker {
    albedo: ArrayState,
    normal: ArrayState,
}

impl DirtyTracker {
    pub fn state(&self, class: ArrayClass) -> ArrayState {
        match class {
            ArrayClass::Albedo => self.albedo,
            ArrayClass::Normal => self.normal,
        }
    }

    pub fn is_dirty(&self, class: ArrayClass) -> bool {
        self.state(class) == ArrayState::Dirty
    }

    fn slot(&mut self, class: ArrayClass) -> &mut ArrayState {
        match class {
            ArrayClass::Albedo => &mut self.albedo,
            ArrayClass::Normal => &mut self.normal,
        }
    }

    pub fn mark(&mut self, class: ArrayClass) {
        *self.slot(class) = ArrayState::Dirty;
    }

    pub fn observe(&mut self, changed: ChangedFlags) {
        if changed.albedo {
            self.mark(ArrayClass::Albedo);
        }
        if changed.normal {
            self.mark(ArrayClass::Normal);
        }
    }

    pub(crate) fn mark_clean(&mut self, class: ArrayClass) {
        *self.slot(class) = ArrayState::Clean;
    }
}
