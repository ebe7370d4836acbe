//! One function per subcommand. Handlers call the API, never print, and return an
//! [`Output`] for the renderer.

use super::render::{from_hex, AttrReport, Output};
use super::setup::{CreateArgs, KindArg, OrderArg};
use anyhow::{anyhow, Result};
use attrdir::api::AttrApi;
use attrdir::catalog::TypeCatalog;
use attrdir::directory::AttrHandle;
use attrdir::index::AttrSelector;
use attrdir::model::{AttrCreateParams, IndexType, IterOrder, ObjectKind};
use attrdir::store::backend::ByteStore;
use tracing::debug;

fn selector(text: &str) -> Result<AttrSelector> {
    text.parse::<AttrSelector>().map_err(|e| anyhow!(e))
}

/// Opens the selected attribute, runs `f`, and closes the handle whatever `f` returns.
fn with_handle<B, T, F>(api: &mut AttrApi<B>, object: &str, sel: &str, f: F) -> Result<T>
where
    B: ByteStore,
    F: FnOnce(&mut AttrApi<B>, AttrHandle) -> Result<T>,
{
    let sel = selector(sel)?;
    let handle = api.open_selected(object, &sel)?;
    let result = f(&mut *api, handle);
    api.close(handle)?;
    result
}

pub fn mkobj<B: ByteStore>(api: &mut AttrApi<B>, path: &str, kind: KindArg) -> Result<Output> {
    let kind = match kind {
        KindArg::Group => ObjectKind::Group,
        KindArg::Dataset => ObjectKind::Dataset,
        KindArg::Type => ObjectKind::NamedType,
    };
    api.create_object(path, kind)?;
    Ok(Output::Message(format!("Created {} {}", kind, path)))
}

pub fn rmobj<B: ByteStore>(api: &mut AttrApi<B>, path: &str) -> Result<Output> {
    api.remove_object(path)?;
    Ok(Output::Message(format!("Removed {}", path)))
}

pub fn objects<B: ByteStore>(api: &AttrApi<B>) -> Result<Output> {
    Ok(Output::Objects(api.container().objects()))
}

pub fn create<B: ByteStore>(api: &mut AttrApi<B>, args: &CreateArgs) -> Result<Output> {
    let dt = api.register_datatype(args.elem_size)?;
    let sp = api.register_dataspace(&args.dims)?;
    let params = if args.utf8 {
        AttrCreateParams::utf8()
    } else {
        AttrCreateParams::default()
    };
    let handle = api.create(&args.object, &args.name, dt, sp, params)?;
    let info = api.get_info(handle);
    api.close(handle)?;
    let info = info?;
    debug!(object = %args.object, name = %args.name, size = info.data_size, "created attribute");
    Ok(Output::Message(format!(
        "Created {} on {} ({} bytes)",
        args.name, args.object, info.data_size
    )))
}

pub fn write<B: ByteStore>(
    api: &mut AttrApi<B>,
    object: &str,
    sel: &str,
    hex: &str,
) -> Result<Output> {
    let bytes = from_hex(hex).map_err(|e| anyhow!(e))?;
    let name = with_handle(api, object, sel, |api, h| {
        api.write(h, &bytes)?;
        Ok(api.get_name(h)?)
    })?;
    Ok(Output::Message(format!("Wrote {} bytes to {}", bytes.len(), name)))
}

pub fn read<B: ByteStore>(api: &mut AttrApi<B>, object: &str, sel: &str) -> Result<Output> {
    with_handle(api, object, sel, |api, h| {
        Ok(Output::Value {
            name: api.get_name(h)?,
            bytes: api.read(h)?,
        })
    })
}

pub fn info<B: ByteStore>(api: &mut AttrApi<B>, object: &str, sel: &str) -> Result<Output> {
    with_handle(api, object, sel, |api, h| {
        let info = api.get_info(h)?;
        let catalog = api.container().catalog();
        let element_size = catalog.element_size(api.get_type(h)?)?;
        let dims = catalog
            .dims(api.get_space(h)?)
            .map(<[u64]>::to_vec)
            .unwrap_or_default();
        Ok(Output::Info(AttrReport {
            name: api.get_name(h)?,
            creation_order: info.corder_valid.then_some(info.creation_order),
            charset: info.charset.to_string(),
            data_size: info.data_size,
            element_size,
            dims,
        }))
    })
}

pub fn rename<B: ByteStore>(
    api: &mut AttrApi<B>,
    object: &str,
    old: &str,
    new: &str,
) -> Result<Output> {
    api.rename(object, old, new)?;
    Ok(Output::Message(format!("Renamed {} to {}", old, new)))
}

pub fn delete<B: ByteStore>(api: &mut AttrApi<B>, object: &str, sel: &str) -> Result<Output> {
    let name = match selector(sel)? {
        AttrSelector::Name(name) => {
            api.delete(object, &name)?;
            name
        }
        AttrSelector::Position { index_type, n } => {
            let name = api.get_name_by_index(object, ".", index_type, IterOrder::Increasing, n)?;
            api.delete_by_index(object, ".", index_type, IterOrder::Increasing, n)?;
            name
        }
    };
    Ok(Output::Message(format!("Deleted {}", name)))
}

pub fn exists<B: ByteStore>(api: &AttrApi<B>, object: &str, name: &str) -> Result<Output> {
    Ok(Output::Exists {
        name: name.to_string(),
        exists: api.exists(object, name)?,
    })
}

pub fn ls<B: ByteStore>(api: &AttrApi<B>, object: &str, by: OrderArg, desc: bool) -> Result<Output> {
    let index_type = match by {
        OrderArg::Name => IndexType::Name,
        OrderArg::Order => IndexType::CreationOrder,
    };
    let order = if desc {
        IterOrder::Decreasing
    } else {
        IterOrder::Increasing
    };
    Ok(Output::Attributes {
        object: object.to_string(),
        entries: api.list(object, index_type, order)?,
    })
}

pub fn count<B: ByteStore>(api: &AttrApi<B>, object: &str) -> Result<Output> {
    Ok(Output::Count {
        object: object.to_string(),
        count: api.count(object)?,
        mode: api.storage_mode(object)?.to_string(),
    })
}
