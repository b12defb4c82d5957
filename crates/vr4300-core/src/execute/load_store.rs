//! Base+offset loads and stores, including the unaligned left/right pairs,
//! load-linked/store-conditional and coprocessor transfers.

use super::{
    address_error, merge_load_left, merge_load_right, merge_store_left, merge_store_right,
    operand, require_64, reserved, sign_extend, sign_extend_16, sign_extend_32, CopWrite, Effect,
    MemoryAccess,
};
use crate::fault::{AccessKind, Exception};
use crate::instruction::{Coprocessor, GeneralRegister, LoadStoreOp};
use crate::memory::{AccessWidth, Endianness, Memory};
use crate::state::RegisterFile;

/// How a loaded value lands in its destination.
#[derive(Clone, Copy)]
enum Extend {
    Signed,
    Zero,
}

#[allow(clippy::too_many_arguments)]
pub(super) fn execute(
    op: LoadStoreOp,
    base: GeneralRegister,
    rt: GeneralRegister,
    offset: u16,
    word: u32,
    registers: &RegisterFile,
    memory: &Memory,
    endianness: Endianness,
) -> Result<Effect, Exception> {
    if op.is_doubleword() {
        require_64(registers, word)?;
    }

    let address =
        registers.effective_address(operand(registers, base).wrapping_add(sign_extend_16(offset)));
    let access = Access {
        address,
        registers,
        memory,
        endianness,
    };

    match op {
        LoadStoreOp::Lb => access.load(rt, AccessWidth::Byte, Extend::Signed),
        LoadStoreOp::Lbu => access.load(rt, AccessWidth::Byte, Extend::Zero),
        LoadStoreOp::Lh => access.load(rt, AccessWidth::Half, Extend::Signed),
        LoadStoreOp::Lhu => access.load(rt, AccessWidth::Half, Extend::Zero),
        LoadStoreOp::Lw => access.load(rt, AccessWidth::Word, Extend::Signed),
        LoadStoreOp::Lwu => access.load(rt, AccessWidth::Word, Extend::Zero),
        LoadStoreOp::Ld => access.load(rt, AccessWidth::Double, Extend::Signed),
        LoadStoreOp::Ll => access.load_linked(rt, AccessWidth::Word),
        LoadStoreOp::Lld => access.load_linked(rt, AccessWidth::Double),
        LoadStoreOp::Lwl => access.load_unaligned(rt, AccessWidth::Word, merge_load_left),
        LoadStoreOp::Lwr => access.load_unaligned(rt, AccessWidth::Word, merge_load_right),
        LoadStoreOp::Ldl => access.load_unaligned(rt, AccessWidth::Double, merge_load_left),
        LoadStoreOp::Ldr => access.load_unaligned(rt, AccessWidth::Double, merge_load_right),

        LoadStoreOp::Sb => access.store(rt, AccessWidth::Byte),
        LoadStoreOp::Sh => access.store(rt, AccessWidth::Half),
        LoadStoreOp::Sw => access.store(rt, AccessWidth::Word),
        LoadStoreOp::Sd => access.store(rt, AccessWidth::Double),
        LoadStoreOp::Sc => access.store_conditional(rt, AccessWidth::Word),
        LoadStoreOp::Scd => access.store_conditional(rt, AccessWidth::Double),
        LoadStoreOp::Swl => access.store_unaligned(rt, AccessWidth::Word, merge_store_left),
        LoadStoreOp::Swr => access.store_unaligned(rt, AccessWidth::Word, merge_store_right),
        LoadStoreOp::Sdl => access.store_unaligned(rt, AccessWidth::Double, merge_store_left),
        LoadStoreOp::Sdr => access.store_unaligned(rt, AccessWidth::Double, merge_store_right),

        // No cache is modeled.
        LoadStoreOp::Cache => Ok(Effect::default()),

        LoadStoreOp::Lwc(Coprocessor::Cp1) => access.load_fpr(rt, AccessWidth::Word),
        LoadStoreOp::Ldc(Coprocessor::Cp1) => access.load_fpr(rt, AccessWidth::Double),
        LoadStoreOp::Swc(Coprocessor::Cp1) => access.store_fpr(rt, AccessWidth::Word),
        LoadStoreOp::Sdc(Coprocessor::Cp1) => access.store_fpr(rt, AccessWidth::Double),
        LoadStoreOp::Lwc(_) | LoadStoreOp::Ldc(_) | LoadStoreOp::Swc(_) | LoadStoreOp::Sdc(_) => {
            Err(reserved(word))
        }
    }
}

type Merge = fn(u64, u64, u64, AccessWidth, Endianness) -> u64;

struct Access<'a> {
    address: u64,
    registers: &'a RegisterFile,
    memory: &'a Memory,
    endianness: Endianness,
}

impl Access<'_> {
    fn read(&self, address: u64, width: AccessWidth, kind: AccessKind) -> Result<u64, Exception> {
        self.memory
            .read(address, width, self.endianness)
            .map_err(|error| address_error(error, kind))
    }

    const fn aligned(&self, width: AccessWidth) -> u64 {
        self.address & !(width.bytes() - 1)
    }

    fn load(
        &self,
        rt: GeneralRegister,
        width: AccessWidth,
        extend: Extend,
    ) -> Result<Effect, Exception> {
        let raw = self.read(self.address, width, AccessKind::Load)?;
        let value = match extend {
            Extend::Signed => sign_extend(raw, width),
            Extend::Zero => raw,
        };
        Ok(Effect {
            gpr_write: Some((rt, value)),
            load: Some(MemoryAccess {
                address: self.address,
                width,
                value: raw,
            }),
            ..Effect::default()
        })
    }

    fn load_linked(&self, rt: GeneralRegister, width: AccessWidth) -> Result<Effect, Exception> {
        let effect = self.load(rt, width, Extend::Signed)?;
        Ok(Effect {
            ll_bit: Some(true),
            ..effect
        })
    }

    fn load_unaligned(
        &self,
        rt: GeneralRegister,
        width: AccessWidth,
        merge: Merge,
    ) -> Result<Effect, Exception> {
        let aligned = self.aligned(width);
        let container = self.read(aligned, width, AccessKind::Load)?;
        let merged = merge(
            self.registers.gpr(rt),
            container,
            self.address,
            width,
            self.endianness,
        );
        let value = match width {
            AccessWidth::Double => merged,
            _ => sign_extend_32(merged),
        };
        Ok(Effect {
            gpr_write: Some((rt, value)),
            load: Some(MemoryAccess {
                address: aligned,
                width,
                value: container,
            }),
            ..Effect::default()
        })
    }

    fn pending_store(
        &self,
        address: u64,
        width: AccessWidth,
        value: u64,
    ) -> Result<Effect, Exception> {
        self.memory
            .probe(address, width)
            .map_err(|error| address_error(error, AccessKind::Store))?;
        Ok(Effect {
            store: Some(MemoryAccess {
                address,
                width,
                value: value & width.mask(),
            }),
            ll_bit: Some(false),
            ..Effect::default()
        })
    }

    fn store(&self, rt: GeneralRegister, width: AccessWidth) -> Result<Effect, Exception> {
        self.pending_store(self.address, width, self.registers.gpr(rt))
    }

    fn store_unaligned(
        &self,
        rt: GeneralRegister,
        width: AccessWidth,
        merge: Merge,
    ) -> Result<Effect, Exception> {
        let aligned = self.aligned(width);
        let container = self.read(aligned, width, AccessKind::Store)?;
        let merged = merge(
            self.registers.gpr(rt),
            container,
            self.address,
            width,
            self.endianness,
        );
        self.pending_store(aligned, width, merged)
    }

    fn store_conditional(
        &self,
        rt: GeneralRegister,
        width: AccessWidth,
    ) -> Result<Effect, Exception> {
        // The address is checked whether or not the link still holds.
        let effect = self.pending_store(self.address, width, self.registers.gpr(rt))?;
        if self.registers.ll_bit() {
            Ok(Effect {
                gpr_write: Some((rt, 1)),
                ..effect
            })
        } else {
            log::warn!("store-conditional at {:#x} failed: link lost", self.address);
            Ok(Effect {
                gpr_write: Some((rt, 0)),
                ll_bit: Some(false),
                ..Effect::default()
            })
        }
    }

    fn load_fpr(&self, ft: GeneralRegister, width: AccessWidth) -> Result<Effect, Exception> {
        let value = self.read(self.address, width, AccessKind::Load)?;
        Ok(Effect {
            cop_write: Some(CopWrite::Fpr {
                index: ft.number(),
                value,
            }),
            load: Some(MemoryAccess {
                address: self.address,
                width,
                value,
            }),
            ..Effect::default()
        })
    }

    fn store_fpr(&self, ft: GeneralRegister, width: AccessWidth) -> Result<Effect, Exception> {
        self.pending_store(self.address, width, self.registers.fpr(ft.number()))
    }
}
