// End-to-end scenarios for asynckv-core live in tests/.
